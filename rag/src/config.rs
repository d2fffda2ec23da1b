//! Configuration for the RAG pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use genai_embeddings::DEFAULT_DIMENSION;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

const DOCUMENT_PLACEHOLDER: &str = "{document}";
const QUESTION_PLACEHOLDER: &str = "{question}";

/// Prompt used when none is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "다음 문서를 기반으로 질문에 답하세요:\n문서: {document}\n질문: {question}";

/// Configuration for the RAG pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Embedding settings.
    pub embedding: EmbeddingConfig,

    /// Answer generation settings.
    pub generation: GenerationConfig,

    /// Prompt sent to the generator.
    pub prompt: PromptTemplate,

    /// Where the document index is persisted. In-memory only when unset.
    pub index_path: Option<PathBuf>,
}

impl RagConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }

    /// Set the index location.
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Set the prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Check settings that serde alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.output_dimensionality == 0 {
            return Err(RagError::Config(
                "embedding.output_dimensionality must be positive".to_string(),
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(RagError::Config("embedding.model is empty".to_string()));
        }
        if self.generation.model.trim().is_empty() {
            return Err(RagError::Config("generation.model is empty".to_string()));
        }
        self.prompt.validate()
    }
}

/// Configuration for document and query embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model name.
    pub model: String,

    /// Requested vector length; every indexed vector has this length.
    pub output_dimensionality: usize,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// Where cached embeddings are persisted, if anywhere.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-multilingual-embedding-002".to_string(),
            output_dimensionality: DEFAULT_DIMENSION,
            cache_enabled: true,
            cache_max_entries: 10000,
            cache_path: None,
        }
    }
}

/// Configuration for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Gemini model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Optional system instruction.
    pub system_instruction: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: None,
            system_instruction: None,
        }
    }
}

/// A prompt with `{document}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Create a template, checking both placeholders are present.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = Self(template.into());
        template.validate()?;
        Ok(template)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check both placeholders are present.
    pub fn validate(&self) -> Result<()> {
        for placeholder in [DOCUMENT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !self.0.contains(placeholder) {
                return Err(RagError::Config(format!(
                    "prompt template is missing {placeholder}"
                )));
            }
        }
        Ok(())
    }

    /// Substitute the placeholders in a single pass, so braces inside the
    /// document or question are kept verbatim.
    pub fn render(&self, document: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + document.len() + question.len());
        let mut rest = self.0.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix(DOCUMENT_PLACEHOLDER) {
                out.push_str(document);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self(DEFAULT_PROMPT_TEMPLATE.to_string())
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
