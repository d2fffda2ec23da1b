//! Text embeddings through the Vertex AI `predict` endpoint.

use async_trait::async_trait;
use genai_embeddings::{
    DEFAULT_DIMENSION, EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
    TaskType,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::VertexClient;
use crate::error::VertexError;

/// Default multilingual text embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-multilingual-embedding-002";

/// Instances per `predict` call accepted by the text embedding models.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 5;

/// [`EmbeddingProvider`] backed by a Vertex AI text embedding model.
#[derive(Debug, Clone)]
pub struct VertexEmbeddingProvider {
    client: VertexClient,
    model: String,
    dimension: usize,
    max_batch_size: usize,
}

impl VertexEmbeddingProvider {
    pub fn new(client: VertexClient) -> Self {
        Self {
            client,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the default output dimensionality.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the number of texts sent per call (at least 1).
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    fn resolve<'a>(&'a self, request: &'a EmbeddingRequest) -> (&'a str, usize) {
        (
            request.model.as_deref().unwrap_or(&self.model),
            request.dimensions.unwrap_or(self.dimension),
        )
    }

    /// One `predict` call for requests sharing a model and dimensionality.
    async fn predict(
        &self,
        model: &str,
        dimension: usize,
        requests: &[EmbeddingRequest],
    ) -> genai_embeddings::Result<Vec<EmbeddingResponse>> {
        let body = PredictRequest {
            instances: requests
                .iter()
                .map(|r| EmbeddingInstance {
                    content: &r.text,
                    task_type: r.task_type,
                })
                .collect(),
            parameters: EmbeddingParameters {
                output_dimensionality: dimension,
            },
        };

        debug!("embedding {} text(s) with {model}", requests.len());
        let response: PredictResponse = self
            .client
            .post_json(model, "predict", &body)
            .await
            .map_err(EmbeddingError::from)?;

        if response.predictions.is_empty() {
            return Err(VertexError::EmptyResponse.into());
        }
        if response.predictions.len() != requests.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} predictions, got {}",
                requests.len(),
                response.predictions.len()
            )));
        }

        response
            .predictions
            .into_iter()
            .map(|prediction| {
                let (values, tokens_used, truncated) = prediction.into_parts();
                if values.len() != dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: values.len(),
                    });
                }
                let mut response = EmbeddingResponse::new(values, model);
                response.tokens_used = tokens_used;
                response.truncated = truncated;
                Ok(response)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for VertexEmbeddingProvider {
    fn name(&self) -> &str {
        "vertex"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> genai_embeddings::Result<EmbeddingResponse> {
        let (model, dimension) = self.resolve(&request);
        self.predict(model, dimension, std::slice::from_ref(&request))
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".into()))
    }

    /// Consecutive requests with the same model and dimensionality share a
    /// call, up to the batch size.
    async fn embed_batch(
        &self,
        requests: Vec<EmbeddingRequest>,
    ) -> genai_embeddings::Result<Vec<EmbeddingResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        let mut start = 0;

        while start < requests.len() {
            let key = self.resolve(&requests[start]);
            let mut end = start + 1;
            while end < requests.len()
                && end - start < self.max_batch_size
                && self.resolve(&requests[end]) == key
            {
                end += 1;
            }

            results.extend(self.predict(key.0, key.1, &requests[start..end]).await?);
            start = end;
        }

        Ok(results)
    }

    fn is_available(&self) -> bool {
        self.client.has_credentials()
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<EmbeddingInstance<'a>>,
    parameters: EmbeddingParameters,
}

#[derive(Serialize)]
struct EmbeddingInstance<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingParameters {
    output_dimensionality: usize,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<EmbeddingPrediction>,
}

/// The service answers either with a structured object or a bare value list.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingPrediction {
    Structured { embeddings: PredictionEmbeddings },
    Values(Vec<f32>),
}

#[derive(Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
    #[serde(default)]
    statistics: Option<EmbeddingStatistics>,
}

#[derive(Deserialize)]
struct EmbeddingStatistics {
    #[serde(default)]
    token_count: Option<u64>,
    #[serde(default)]
    truncated: bool,
}

impl EmbeddingPrediction {
    fn into_parts(self) -> (Vec<f32>, Option<u64>, bool) {
        match self {
            Self::Structured { embeddings } => {
                let (tokens, truncated) = embeddings
                    .statistics
                    .map(|s| (s.token_count, s.truncated))
                    .unwrap_or((None, false));
                (embeddings.values, tokens, truncated)
            }
            Self::Values(values) => (values, None, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_instance_wire_format() {
        let request = EmbeddingRequest::query("Vertex AI로 RAG를 어떻게 구현하나요?");
        let body = PredictRequest {
            instances: vec![EmbeddingInstance {
                content: &request.text,
                task_type: request.task_type,
            }],
            parameters: EmbeddingParameters {
                output_dimensionality: 256,
            },
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "instances": [{
                    "content": "Vertex AI로 RAG를 어떻게 구현하나요?",
                    "task_type": "RETRIEVAL_QUERY"
                }],
                "parameters": {"outputDimensionality": 256}
            })
        );
    }

    #[test]
    fn test_both_prediction_shapes_parse() {
        let response: PredictResponse = serde_json::from_value(json!({
            "predictions": [
                {"embeddings": {"values": [0.5, 0.5], "statistics": {"token_count": 7, "truncated": true}}},
                [0.25, 0.75]
            ]
        }))
        .unwrap();

        let mut parts = response
            .predictions
            .into_iter()
            .map(EmbeddingPrediction::into_parts);
        assert_eq!(parts.next(), Some((vec![0.5, 0.5], Some(7), true)));
        assert_eq!(parts.next(), Some((vec![0.25, 0.75], None, false)));
    }
}
