//! # Embeddings
//!
//! Embedding similarity search for retrieval-augmented generation.
//!
//! ## Features
//!
//! - **Nearest-Embedding Retrieval**: cosine similarity and best-match search
//! - **Similarity Index**: a persistent, ordered document embedding set
//! - **Provider Trait**: the seam where a hosted embedding service plugs in
//! - **Caching**: avoid re-embedding identical text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► SimilarityIndex            │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  CachedProvider     cosine_similarity  find_most_similar       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use genai_embeddings::find_most_similar;
//!
//! let mut docs = HashMap::new();
//! docs.insert("d1".to_string(), vec![1.0_f32, 0.0]);
//! docs.insert("d2".to_string(), vec![0.0_f32, 1.0]);
//!
//! let best = find_most_similar(&docs, &[0.9, 0.1])?;
//! assert_eq!(best.id, "d1");
//! # Ok::<(), genai_embeddings::EmbeddingError>(())
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CacheKey, CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::{IndexEntry, SimilarityIndex};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, TaskType};
pub use similarity::{
    MostSimilar, SimilarityResult, average, cosine_similarity, dot_product, euclidean_distance,
    find_most_similar, find_top_k, normalize,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default output dimensionality requested from the embedding service.
pub const DEFAULT_DIMENSION: usize = 256;
