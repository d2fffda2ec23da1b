//! Answer generation backends.

use async_trait::async_trait;
use genai_vertex::{GenerativeModel, Part};

use crate::error::Result;

/// Turns a filled-in prompt into an answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer for `prompt`.
    async fn generate_answer(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl AnswerGenerator for GenerativeModel {
    async fn generate_answer(&self, prompt: &str) -> Result<String> {
        let response = self.generate_content([Part::text(prompt)]).await?;
        Ok(response.text()?)
    }
}
