//! Error types for the embeddings system.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Failures from similarity search, indexing and embedding providers.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Two vectors compared in one operation have different lengths.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A candidate's embedding disagrees with the query's length.
    #[error("dimension mismatch for candidate {id}: expected {expected}, got {actual}")]
    CandidateDimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// Retrieval attempted with an empty candidate set.
    #[error("no candidates to compare against")]
    NoCandidates,

    /// No index entry with this id.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// The provider lacks credentials or settings.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The embedding service rejected the call.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The service answered with something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// Whether this error reports vectors of unequal length.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::CandidateDimensionMismatch { .. }
        )
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Similarity and index errors are local validation failures and never
    /// retryable; only provider-side throttling is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
