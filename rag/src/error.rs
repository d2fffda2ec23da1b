//! Error types for the RAG pipeline.

use thiserror::Error;

/// Result type alias for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while indexing or answering.
#[derive(Error, Debug)]
pub enum RagError {
    /// Embedding or retrieval error.
    #[error("embedding error: {0}")]
    Embedding(#[from] genai_embeddings::EmbeddingError),

    /// Vertex AI error.
    #[error("vertex error: {0}")]
    Vertex(#[from] genai_vertex::VertexError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The generator produced no usable answer.
    #[error("generation error: {0}")]
    Generation(String),

    /// An indexed entry has no stored document content.
    #[error("no content stored for document {0}")]
    MissingContent(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
