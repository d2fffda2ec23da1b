//! Embedding provider abstraction.
//!
//! The retrieval core only needs vectors of a consistent dimension; the
//! provider trait is the seam where a hosted embedding service plugs in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::Result;

/// Hint telling the embedding service how the text will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Text stored in the searchable corpus.
    RetrievalDocument,
    /// Text used to search the corpus.
    RetrievalQuery,
    SemanticSimilarity,
    Classification,
    Clustering,
}

impl TaskType {
    /// Wire name of the task type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            Self::RetrievalQuery => "RETRIEVAL_QUERY",
            Self::SemanticSimilarity => "SEMANTIC_SIMILARITY",
            Self::Classification => "CLASSIFICATION",
            Self::Clustering => "CLUSTERING",
        }
    }
}

/// Text to embed, with optional per-request overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub text: String,

    /// Task type hint (document vs. query).
    pub task_type: Option<TaskType>,

    /// Overrides the provider default model.
    pub model: Option<String>,

    /// Overrides the provider default output length.
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: None,
            model: None,
            dimensions: None,
        }
    }

    /// Request a document embedding.
    pub fn document(text: impl Into<String>) -> Self {
        Self::new(text).with_task_type(TaskType::RetrievalDocument)
    }

    /// Request a query embedding.
    pub fn query(text: impl Into<String>) -> Self {
        Self::new(text).with_task_type(TaskType::RetrievalQuery)
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// A vector returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Embedding,

    /// Model that produced the vector.
    pub model: String,

    /// Always `embedding.len()`.
    pub dimension: usize,

    /// Input tokens, when the service reports them.
    pub tokens_used: Option<u64>,

    /// Whether the input was truncated by the service.
    pub truncated: bool,
}

impl EmbeddingResponse {
    /// Build a response, deriving the dimension from the vector.
    pub fn new(embedding: Embedding, model: impl Into<String>) -> Self {
        Self {
            dimension: embedding.len(),
            embedding,
            model: model.into(),
            tokens_used: None,
            truncated: false,
        }
    }
}

/// A service that turns text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Output length used when a request sets none.
    fn default_dimension(&self) -> usize;

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Embed several requests. Responses are returned in request order.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Whether the provider has what it needs to make calls.
    fn is_available(&self) -> bool;
}
