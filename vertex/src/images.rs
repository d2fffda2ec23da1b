//! Imagen image generation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::VertexClient;
use crate::error::{Result, VertexError};

/// Default Imagen model.
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

/// Language of the prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePromptLanguage {
    Auto,
    En,
    Es,
    Hi,
    Ja,
    Ko,
    Pt,
    Zh,
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

/// Parameters for an image generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub number_of_images: u32,
    pub language: Option<ImagePromptLanguage>,
    /// Let the service rewrite the prompt before generating.
    pub enhance_prompt: Option<bool>,
    pub aspect_ratio: Option<AspectRatio>,
    pub negative_prompt: Option<String>,
}

impl ImageGenerationRequest {
    /// One image from `prompt` with the default model.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            prompt: prompt.into(),
            number_of_images: 1,
            language: None,
            enhance_prompt: None,
            aspect_ratio: None,
            negative_prompt: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_number_of_images(mut self, n: u32) -> Self {
        self.number_of_images = n;
        self
    }

    pub fn with_language(mut self, language: ImagePromptLanguage) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_enhance_prompt(mut self, enhance: bool) -> Self {
        self.enhance_prompt = Some(enhance);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    fn to_predict_request(&self) -> PredictRequest<'_> {
        PredictRequest {
            instances: vec![ImageInstance {
                prompt: &self.prompt,
            }],
            parameters: ImageParameters {
                sample_count: self.number_of_images,
                language: self.language,
                enhance_prompt: self.enhance_prompt,
                aspect_ratio: self.aspect_ratio,
                negative_prompt: self.negative_prompt.as_deref(),
            },
        }
    }
}

/// A decoded generated image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// The rewritten prompt, when prompt enhancement was on.
    pub enhanced_prompt: Option<String>,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<ImageInstance<'a>>,
    parameters: ImageParameters<'a>,
}

#[derive(Serialize)]
struct ImageInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageParameters<'a> {
    sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<ImagePromptLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enhance_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<ImagePrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePrediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    prompt: Option<String>,
    rai_filtered_reason: Option<String>,
}

impl VertexClient {
    /// Generate images with Imagen. Images are returned in memory.
    ///
    /// Predictions withheld by the service's content filter are skipped; if
    /// nothing is left the call fails with [`VertexError::EmptyResponse`].
    pub async fn generate_images(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<Vec<GeneratedImage>> {
        debug!(
            "generating {} image(s) with {}",
            request.number_of_images, request.model
        );
        let response: PredictResponse = self
            .post_json(&request.model, "predict", &request.to_predict_request())
            .await?;

        let mut images = Vec::with_capacity(response.predictions.len());
        for prediction in response.predictions {
            let Some(data) = prediction.bytes_base64_encoded else {
                let reason = prediction.rai_filtered_reason.unwrap_or_default();
                warn!("image withheld by content filter: {reason}");
                continue;
            };
            images.push(GeneratedImage {
                bytes: STANDARD.decode(data)?,
                mime_type: prediction
                    .mime_type
                    .unwrap_or_else(|| "image/png".to_string()),
                enhanced_prompt: prediction.prompt,
            });
        }

        if images.is_empty() {
            return Err(VertexError::EmptyResponse);
        }
        Ok(images)
    }
}
