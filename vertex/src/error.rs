//! Error types for the Vertex AI client.

use genai_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for Vertex AI operations.
pub type Result<T> = std::result::Result<T, VertexError>;

/// Errors that can occur when talking to Vertex AI.
#[derive(Error, Debug)]
pub enum VertexError {
    /// A required setting is missing.
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Response did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Response carried no candidates or no usable parts.
    #[error("got empty response from model")]
    EmptyResponse,

    /// Function calls were required but the model suggested none.
    #[error("got no function call suggestions from model")]
    NoFunctionCalls,

    /// The model called a function that is not registered.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Function call arguments failed schema validation.
    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    /// A registered function handler failed.
    #[error("function {name} failed: {message}")]
    Handler { name: String, message: String },

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl VertexError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<VertexError> for EmbeddingError {
    fn from(err: VertexError) -> Self {
        match err {
            VertexError::NotConfigured(_) => EmbeddingError::ProviderNotConfigured,
            VertexError::RateLimited { retry_after_secs } => {
                EmbeddingError::RateLimited { retry_after_secs }
            }
            VertexError::InvalidResponse(message) => EmbeddingError::InvalidResponse(message),
            VertexError::EmptyResponse => {
                EmbeddingError::InvalidResponse("empty embedding response".to_string())
            }
            VertexError::Serialization(e) => EmbeddingError::Serialization(e),
            other => EmbeddingError::ApiRequest(other.to_string()),
        }
    }
}
