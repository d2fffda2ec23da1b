//! # Vertex AI
//!
//! A thin REST client for the generative models hosted on Vertex AI.
//!
//! ## Features
//!
//! - **Gemini**: text and multimodal generation, chat sessions
//! - **Function Calling**: declarations, argument validation, concurrent dispatch
//! - **Imagen**: image generation returned as in-memory bytes
//! - **Embeddings**: an [`EmbeddingProvider`](genai_embeddings::EmbeddingProvider)
//!   for the text embedding models
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         VertexClient                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  GenerativeModel ──► generateContent ◄── ChatSession            │
//! │        │                                     │                  │
//! │        ▼                                     ▼                  │
//! │   Tool / Schema                      FunctionRegistry           │
//! │                                                                 │
//! │  generate_images ──► predict ◄── VertexEmbeddingProvider        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use genai_vertex::{Part, VertexClient, VertexConfig};
//!
//! let config = VertexConfig::new("my-project").with_access_token(token);
//! let model = VertexClient::new(config)?
//!     .generative_model("gemini-2.0-flash")
//!     .with_temperature(0.4);
//!
//! let response = model
//!     .generate_content([
//!         Part::file_uri("gs://cloud-samples-data/generative-ai/image/cat.jpg"),
//!         Part::text("describe this image"),
//!     ])
//!     .await?;
//! println!("{}", response.text()?);
//! ```

pub mod chat;
pub mod client;
pub mod config;
pub mod content;
pub mod embedding;
pub mod error;
pub mod functions;
pub mod images;
pub mod schema;

pub use chat::ChatSession;
pub use client::{
    Candidate, GenerateContentRequest, GenerateContentResponse, GenerativeModel, UsageMetadata,
    VertexClient,
};
pub use config::{
    GenerationConfig, HarmBlockThreshold, HarmCategory, SafetySetting, VertexConfig,
};
pub use content::{Blob, Content, FileData, Part, Role};
pub use embedding::VertexEmbeddingProvider;
pub use error::{Result, VertexError};
pub use functions::{FunctionHandler, FunctionRegistry};
pub use images::{AspectRatio, GeneratedImage, ImageGenerationRequest, ImagePromptLanguage};
pub use schema::{FunctionCall, FunctionDeclaration, FunctionResponse, Schema, SchemaType, Tool};
