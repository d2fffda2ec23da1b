//! # RAG
//!
//! Retrieval-augmented generation: answer a question from the single indexed
//! document whose embedding is closest to the question's.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         RagPipeline                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  Documents ──► EmbeddingProvider ──► SimilarityIndex ──► disk   │
//! │                      ▲                     │                    │
//! │  Question ───────────┘                     ▼                    │
//! │                                      find_most_similar          │
//! │                                            │                    │
//! │                                            ▼                    │
//! │                     PromptTemplate ──► AnswerGenerator          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use genai_rag::{Document, RagConfig, RagPipeline};
//! use genai_vertex::VertexClient;
//!
//! let pipeline = RagPipeline::vertex(VertexClient::from_env()?, RagConfig::default()).await?;
//! pipeline
//!     .index_documents([
//!         Document::new("doc1", "Vertex AI is Google Cloud's ML platform"),
//!         Document::new("doc2", "RAG combines search and generation"),
//!     ])
//!     .await?;
//!
//! let answer = pipeline.answer("How do I build RAG with Vertex AI?").await?;
//! println!("{} (from {})", answer.answer, answer.document.id);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod generator;

pub use config::{EmbeddingConfig, GenerationConfig, PromptTemplate, RagConfig};
pub use engine::{Document, RagAnswer, RagPipeline, RetrievedDocument};
pub use error::{RagError, Result};
pub use generator::AnswerGenerator;

// Re-export from dependencies for convenience
pub use genai_embeddings::{EmbeddingProvider, SimilarityIndex};
