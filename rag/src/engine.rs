//! RAG pipeline implementation.

use std::collections::HashSet;

use genai_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingProvider, EmbeddingRequest, SimilarityIndex,
};
use genai_vertex::{GenerativeModel, VertexClient, VertexEmbeddingProvider};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;

/// Metadata key under which document text is stored in the index.
const CONTENT_KEY: &str = "content";

/// A document to make searchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// The best-matching document for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// A generated answer with the document it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub document: RetrievedDocument,
}

/// Retrieval-augmented generation over a document index.
///
/// Documents are embedded once and kept in a [`SimilarityIndex`]. A query is
/// embedded, matched against the index, and the best document is handed to
/// the generator inside the configured prompt.
pub struct RagPipeline<E, G> {
    config: RagConfig,
    embedder: E,
    generator: G,
    index: RwLock<SimilarityIndex>,
}

impl RagPipeline<CachedProvider<VertexEmbeddingProvider>, GenerativeModel> {
    /// Build a pipeline backed by Vertex AI embeddings and Gemini.
    pub async fn vertex(client: VertexClient, config: RagConfig) -> Result<Self> {
        let provider = VertexEmbeddingProvider::new(client.clone())
            .with_model(config.embedding.model.clone())
            .with_dimension(config.embedding.output_dimensionality);

        let max_entries = if config.embedding.cache_enabled {
            config.embedding.cache_max_entries
        } else {
            0
        };
        let cache = match &config.embedding.cache_path {
            Some(path) if config.embedding.cache_enabled => {
                EmbeddingCache::with_persistence(path, max_entries).await?
            }
            _ => EmbeddingCache::new(max_entries),
        };

        let mut model = client.generative_model(config.generation.model.clone());
        if let Some(temperature) = config.generation.temperature {
            model = model.with_temperature(temperature);
        }
        if let Some(instruction) = &config.generation.system_instruction {
            model = model.with_system_instruction(instruction.clone());
        }

        Self::open(config, CachedProvider::new(provider, cache), model).await
    }
}

impl<E, G> RagPipeline<E, G>
where
    E: EmbeddingProvider,
    G: AnswerGenerator,
{
    /// Create a pipeline with an empty in-memory index.
    pub fn new(config: RagConfig, embedder: E, generator: G) -> Result<Self> {
        config.validate()?;
        let index = SimilarityIndex::new(config.embedding.output_dimensionality);
        Ok(Self {
            config,
            embedder,
            generator,
            index: RwLock::new(index),
        })
    }

    /// Create a pipeline, loading the index from `index_path` if it exists.
    pub async fn open(config: RagConfig, embedder: E, generator: G) -> Result<Self> {
        let pipeline = Self::new(config, embedder, generator)?;

        let Some(path) = &pipeline.config.index_path else {
            return Ok(pipeline);
        };
        if tokio::fs::try_exists(path).await? {
            let loaded =
                SimilarityIndex::load(path, pipeline.config.embedding.output_dimensionality)
                    .await?;
            info!("Loaded {} documents from {}", loaded.len(), path.display());
            *pipeline.index.write().await = loaded;
        }

        Ok(pipeline)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Number of indexed documents.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.index.read().await.contains(id)
    }

    fn request(&self, request: EmbeddingRequest) -> EmbeddingRequest {
        request
            .with_model(self.config.embedding.model.clone())
            .with_dimensions(self.config.embedding.output_dimensionality)
    }

    /// Embed and index documents whose ids are not yet present.
    ///
    /// Already-indexed ids, and repeats of an id within `documents`, are
    /// skipped without being embedded. Returns the number newly indexed.
    pub async fn index_documents(
        &self,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<usize> {
        let pending: Vec<Document> = {
            let index = self.index.read().await;
            let mut seen = HashSet::new();
            documents
                .into_iter()
                .filter(|doc| !index.contains(&doc.id) && seen.insert(doc.id.clone()))
                .collect()
        };

        if pending.is_empty() {
            debug!("No new documents to index");
            return Ok(0);
        }

        let requests = pending
            .iter()
            .map(|doc| self.request(EmbeddingRequest::document(doc.content.clone())))
            .collect();
        let responses = self.embedder.embed_batch(requests).await?;
        if responses.len() != pending.len() {
            return Err(genai_embeddings::EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                pending.len(),
                responses.len()
            ))
            .into());
        }

        let expected = self.config.embedding.output_dimensionality;
        if let Some(bad) = responses.iter().find(|r| r.embedding.len() != expected) {
            return Err(genai_embeddings::EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.embedding.len(),
            }
            .into());
        }

        let mut index = self.index.write().await;
        let mut inserted = 0;
        for (doc, response) in pending.into_iter().zip(responses) {
            let metadata = serde_json::json!({ CONTENT_KEY: doc.content });
            if index.insert_if_absent(doc.id, response.embedding, Some(metadata))? {
                inserted += 1;
            }
        }

        info!("Indexed {inserted} new document(s)");
        Ok(inserted)
    }

    /// Find the document most similar to `query`.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedDocument> {
        let response = self
            .embedder
            .embed(self.request(EmbeddingRequest::query(query)))
            .await?;

        let index = self.index.read().await;
        let best = index.nearest(&response.embedding)?;

        let content = index
            .get(&best.id)
            .and_then(|entry| entry.metadata.as_ref())
            .and_then(|metadata| metadata[CONTENT_KEY].as_str())
            .ok_or_else(|| RagError::MissingContent(best.id.clone()))?
            .to_string();

        debug!("Retrieved {} with score {}", best.id, best.score);
        Ok(RetrievedDocument {
            id: best.id,
            content,
            score: best.score,
        })
    }

    /// Answer `query` from its most similar document.
    pub async fn answer(&self, query: &str) -> Result<RagAnswer> {
        let document = self.retrieve(query).await?;
        let prompt = self.config.prompt.render(&document.content, query);

        let answer = self.generator.generate_answer(&prompt).await?;
        if answer.trim().is_empty() {
            warn!("Generator returned an empty answer for document {}", document.id);
            return Err(RagError::Generation("empty answer".to_string()));
        }

        Ok(RagAnswer { answer, document })
    }

    /// Save the index to `index_path`. Returns `false` when no path is set.
    pub async fn persist(&self) -> Result<bool> {
        let Some(path) = &self.config.index_path else {
            return Ok(false);
        };
        self.index.read().await.save(path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genai_embeddings::EmbeddingResponse;

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        fn name(&self) -> &str {
            "constant"
        }

        fn default_model(&self) -> &str {
            "constant"
        }

        fn default_dimension(&self) -> usize {
            2
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> genai_embeddings::Result<EmbeddingResponse> {
            Ok(EmbeddingResponse::new(vec![1.0, 0.0], request.model.unwrap_or_default()))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    struct Echo;

    #[async_trait]
    impl AnswerGenerator for Echo {
        async fn generate_answer(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    fn config() -> RagConfig {
        let mut config = RagConfig::default();
        config.embedding.output_dimensionality = 2;
        config
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.embedding.output_dimensionality = 0;
        assert!(matches!(
            RagPipeline::new(config, ConstantEmbedder, Echo),
            Err(RagError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_batch() {
        let pipeline = RagPipeline::new(config(), ConstantEmbedder, Echo).unwrap();
        let inserted = pipeline
            .index_documents([Document::new("a", "first"), Document::new("a", "second")])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(pipeline.retrieve("q").await.unwrap().content, "first");
    }

    struct RaggedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for RaggedEmbedder {
        fn name(&self) -> &str {
            "ragged"
        }

        fn default_model(&self) -> &str {
            "ragged"
        }

        fn default_dimension(&self) -> usize {
            2
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> genai_embeddings::Result<EmbeddingResponse> {
            let embedding = if request.text == "short" {
                vec![1.0]
            } else {
                vec![1.0, 0.0]
            };
            Ok(EmbeddingResponse::new(embedding, "ragged"))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_batch_with_wrong_length_indexes_nothing() {
        let pipeline = RagPipeline::new(config(), RaggedEmbedder, Echo).unwrap();
        let err = pipeline
            .index_documents([Document::new("a", "fine"), Document::new("b", "short")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RagError::Embedding(genai_embeddings::EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(pipeline.is_empty().await);
    }

    #[tokio::test]
    async fn test_persist_without_path() {
        let pipeline = RagPipeline::new(config(), ConstantEmbedder, Echo).unwrap();
        assert!(!pipeline.persist().await.unwrap());
    }
}
