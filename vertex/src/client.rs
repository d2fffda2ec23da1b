//! Vertex AI REST client and Gemini content generation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::ChatSession;
use crate::config::{GenerationConfig, SafetySetting, VertexConfig};
use crate::content::{Content, Part};
use crate::error::{Result, VertexError};
use crate::schema::{FunctionCall, Tool};

/// Seconds to wait when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A handle to the Vertex AI REST API for one project and location.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct VertexClient {
    config: Arc<VertexConfig>,
    http: reqwest::Client,
}

impl VertexClient {
    /// Build a client from an explicit configuration.
    pub fn new(config: VertexConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Build a client from `GOOGLE_CLOUD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(VertexConfig::from_env()?)
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    /// Whether a bearer token is configured.
    pub fn has_credentials(&self) -> bool {
        self.config.access_token.is_some()
    }

    /// A Gemini model handle with default parameters.
    pub fn generative_model(&self, name: impl Into<String>) -> GenerativeModel {
        GenerativeModel {
            client: self.clone(),
            name: name.into(),
            generation_config: GenerationConfig::default(),
            safety_settings: Vec::new(),
            tools: Vec::new(),
            system_instruction: None,
        }
    }

    /// POST `body` to `model:method` and decode the JSON reply.
    pub(crate) async fn post_json<B, R>(&self, model: &str, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or_else(|| VertexError::NotConfigured("access token is not set".into()))?;

        let url = self.config.endpoint(model, method);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await?;

        if !status.is_success() {
            let err = map_http_status(status, retry_after, &text);
            warn!("{model}:{method} failed: {err}");
            return Err(err);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Map a non-success status to a [`VertexError`].
fn map_http_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> VertexError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return VertexError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        };
    }

    VertexError::Api {
        status: status.as_u16(),
        message: error_message(body),
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// A configured Gemini model.
#[derive(Debug, Clone)]
pub struct GenerativeModel {
    client: VertexClient,
    name: String,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
    tools: Vec<Tool>,
    system_instruction: Option<Content>,
}

impl GenerativeModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sampling temperature. `0.0` is the most deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config.temperature = Some(temperature);
        self
    }

    /// Cap the number of generated tokens.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.generation_config.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Replace all sampling parameters.
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(Content::system(instruction));
        self
    }

    /// The request body for `contents` with this model's settings.
    pub fn build_request(&self, contents: Vec<Content>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction.clone(),
            tools: self.tools.clone(),
            safety_settings: self.safety_settings.clone(),
            generation_config: (!self.generation_config.is_empty())
                .then(|| self.generation_config.clone()),
        }
    }

    /// Generate a response to a single user turn.
    pub async fn generate_content(
        &self,
        parts: impl IntoIterator<Item = Part>,
    ) -> Result<GenerateContentResponse> {
        self.generate(vec![Content::user(parts)]).await
    }

    /// Generate a response to a full conversation.
    pub async fn generate(&self, contents: Vec<Content>) -> Result<GenerateContentResponse> {
        debug!(
            "generateContent on {} with {} turn(s)",
            self.name,
            contents.len()
        );
        let request = self.build_request(contents);
        self.client
            .post_json(&self.name, "generateContent", &request)
            .await
    }

    /// Start a multi-turn conversation.
    pub fn start_chat(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }
}

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Reply to a `generateContent` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// The first candidate, or [`VertexError::EmptyResponse`].
    pub fn first_candidate(&self) -> Result<&Candidate> {
        self.candidates.first().ok_or(VertexError::EmptyResponse)
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Result<String> {
        let text = self.first_candidate()?.content.text();
        if text.is_empty() {
            return Err(VertexError::EmptyResponse);
        }
        Ok(text)
    }

    /// Function calls suggested by the first candidate, in order.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(Part::as_function_call)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Function calls of the first candidate; fails if there are none.
    pub fn require_function_calls(&self) -> Result<Vec<FunctionCall>> {
        self.first_candidate()?;
        let calls = self.function_calls();
        if calls.is_empty() {
            return Err(VertexError::NoFunctionCalls);
        }
        Ok(calls)
    }
}

/// One generated alternative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Token accounting for a call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,

    #[serde(default)]
    pub candidates_token_count: u32,

    #[serde(default)]
    pub total_token_count: u32,
}
