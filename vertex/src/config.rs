//! Client and generation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VertexError};

/// Default region for Vertex AI requests.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for a Vertex AI project.
///
/// The access token is a pre-obtained OAuth bearer token (for example from
/// `gcloud auth print-access-token`). It is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    /// GCP project ID.
    pub project_id: String,

    /// Region, e.g. `us-central1`, or `global`.
    #[serde(default = "default_location")]
    pub location: String,

    /// Bearer token for the REST API.
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,

    /// Override for the API host, used for proxies and tests.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl VertexConfig {
    /// Create a configuration for `project_id` in the default location.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: default_location(),
            access_token: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_LOCATION` and
    /// `GOOGLE_CLOUD_ACCESS_TOKEN` from the environment.
    pub fn from_env() -> Result<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .map_err(|_| VertexError::NotConfigured("GOOGLE_CLOUD_PROJECT is not set".into()))?;

        let mut config = Self::new(project_id);
        if let Ok(location) = std::env::var("GOOGLE_CLOUD_LOCATION") {
            config.location = location;
        }
        config.access_token = std::env::var("GOOGLE_CLOUD_ACCESS_TOKEN").ok();
        Ok(config)
    }

    /// Set the region.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the bearer token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the API host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// API host for the configured location.
    pub fn host(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.location == "global" => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Full resource name of a publisher model.
    pub fn model_resource(&self, model: &str) -> String {
        format!(
            "projects/{}/locations/{}/publishers/google/models/{model}",
            self.project_id, self.location
        )
    }

    /// URL for invoking `method` (e.g. `generateContent`, `predict`) on `model`.
    pub fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1/{}:{method}", self.host(), self.model_resource(model))
    }
}

/// Sampling parameters for content generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,

    /// e.g. `application/json` for structured output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Harm categories that safety settings can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Probability threshold at which content is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
    Off,
}

/// A per-category safety threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    pub fn new(category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        Self {
            category,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_regional_endpoint() {
        let config = VertexConfig::new("demo-project");
        assert_eq!(
            config.endpoint("gemini-2.0-flash", "generateContent"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo-project/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_global_and_override_hosts() {
        let global = VertexConfig::new("p").with_location("global");
        assert_eq!(global.host(), "https://aiplatform.googleapis.com");

        let proxied = VertexConfig::new("p").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(proxied.host(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_access_token_is_not_serialized() {
        let config = VertexConfig::new("p").with_access_token("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_generation_config_wire_names() {
        let config = GenerationConfig {
            temperature: Some(0.4),
            max_output_tokens: Some(128),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"temperature": 0.4f32, "maxOutputTokens": 128})
        );
        assert!(GenerationConfig::default().is_empty());
    }

    #[test]
    fn test_safety_setting_wire_names() {
        let setting = SafetySetting::new(
            HarmCategory::DangerousContent,
            HarmBlockThreshold::BlockLowAndAbove,
        );
        assert_eq!(
            serde_json::to_value(setting).unwrap(),
            serde_json::json!({
                "category": "HARM_CATEGORY_DANGEROUS_CONTENT",
                "threshold": "BLOCK_LOW_AND_ABOVE"
            })
        );
    }
}
