//! Multi-turn conversations.

use tracing::debug;

use crate::client::{GenerateContentResponse, GenerativeModel};
use crate::content::{Content, Part, Role};
use crate::error::{Result, VertexError};
use crate::functions::FunctionRegistry;

/// A conversation with a model that remembers previous turns.
#[derive(Debug, Clone)]
pub struct ChatSession {
    model: GenerativeModel,
    history: Vec<Content>,
}

impl ChatSession {
    pub(crate) fn new(model: GenerativeModel) -> Self {
        Self {
            model,
            history: Vec::new(),
        }
    }

    /// All turns so far, oldest first.
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Send a user turn and record the model's reply.
    ///
    /// On failure the history is left as it was before the call.
    pub async fn send(
        &mut self,
        parts: impl IntoIterator<Item = Part>,
    ) -> Result<GenerateContentResponse> {
        self.history.push(Content::user(parts));

        let reply = self
            .model
            .generate(self.history.clone())
            .await
            .and_then(|response| {
                let mut content = response.first_candidate()?.content.clone();
                content.role = Some(Role::Model);
                Ok((response, content))
            });

        match reply {
            Ok((response, content)) => {
                self.history.push(content);
                Ok(response)
            }
            Err(err) => {
                self.history.pop();
                Err(err)
            }
        }
    }

    /// Send a user turn, then answer function calls from `registry` until the
    /// model replies without any, or `max_rounds` rounds of calls have run.
    ///
    /// On failure every turn added by this call is dropped from the history.
    pub async fn send_with_functions(
        &mut self,
        parts: impl IntoIterator<Item = Part>,
        registry: &FunctionRegistry,
        max_rounds: usize,
    ) -> Result<GenerateContentResponse> {
        let checkpoint = self.history.len();
        let result = self.function_rounds(parts, registry, max_rounds).await;
        if result.is_err() {
            self.history.truncate(checkpoint);
        }
        result
    }

    async fn function_rounds(
        &mut self,
        parts: impl IntoIterator<Item = Part>,
        registry: &FunctionRegistry,
        max_rounds: usize,
    ) -> Result<GenerateContentResponse> {
        let mut response = self.send(parts).await?;

        for round in 0..max_rounds {
            let calls = response.function_calls();
            if calls.is_empty() {
                return Ok(response);
            }
            debug!("function round {round}: {} call(s)", calls.len());

            let results = registry.dispatch_all(&calls).await?;
            response = self.send(results.into_iter().map(Part::from)).await?;
        }

        if response.function_calls().is_empty() {
            Ok(response)
        } else {
            Err(VertexError::InvalidResponse(format!(
                "model still requested functions after {max_rounds} round(s)"
            )))
        }
    }
}
