//! End-to-end tests for the RAG pipeline.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use genai_embeddings::{EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use genai_rag::{AnswerGenerator, Document, RagConfig, RagError, RagPipeline};
use genai_vertex::{VertexClient, VertexConfig};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const VOCABULARY: [&str; 4] = ["vertex", "rag", "platform", "search"];

/// Embeds text as keyword counts over a fixed vocabulary.
#[derive(Default)]
struct KeywordEmbedder {
    calls: AtomicUsize,
}

fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    VOCABULARY
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn default_model(&self) -> &str {
        "keyword"
    }

    fn default_dimension(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, request: EmbeddingRequest) -> genai_embeddings::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResponse::new(keyword_vector(&request.text), "keyword"))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Records prompts and answers with a fixed reply.
struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn generate_answer(&self, prompt: &str) -> genai_rag::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

fn config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embedding.output_dimensionality = VOCABULARY.len();
    config
}

fn documents() -> Vec<Document> {
    vec![
        Document::new("doc1", "Vertex AI is Google Cloud's ML platform"),
        Document::new("doc2", "RAG combines search and generation"),
    ]
}

#[tokio::test]
async fn answers_from_most_similar_document() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let pipeline = RagPipeline::new(
        config(),
        KeywordEmbedder::default(),
        RecordingGenerator::new("Use the Vertex AI platform."),
    )?;
    assert_eq!(pipeline.index_documents(documents()).await?, 2);

    let answer = pipeline.answer("Which platform is Vertex?").await?;
    assert_eq!(answer.document.id, "doc1");
    assert!((answer.document.score - 1.0).abs() < 1e-6);
    assert_eq!(answer.answer, "Use the Vertex AI platform.");

    let prompts = pipeline.generator().prompts.lock().unwrap().clone();
    assert_eq!(
        prompts,
        vec![
            "다음 문서를 기반으로 질문에 답하세요:\n\
             문서: Vertex AI is Google Cloud's ML platform\n\
             질문: Which platform is Vertex?"
                .to_string()
        ]
    );

    let other = pipeline.retrieve("how does rag search work").await?;
    assert_eq!(other.id, "doc2");
    assert_eq!(other.content, "RAG combines search and generation");
    Ok(())
}

#[tokio::test]
async fn already_indexed_documents_are_not_embedded_again() -> anyhow::Result<()> {
    let pipeline = RagPipeline::new(config(), KeywordEmbedder::default(), RecordingGenerator::new("ok"))?;

    assert_eq!(pipeline.index_documents(documents()).await?, 2);
    assert_eq!(pipeline.embedder().calls.load(Ordering::SeqCst), 2);

    let inserted = pipeline
        .index_documents([
            Document::new("doc1", "replacement text is ignored"),
            Document::new("doc3", "Search across the platform"),
        ])
        .await?;

    assert_eq!(inserted, 1);
    assert_eq!(pipeline.embedder().calls.load(Ordering::SeqCst), 3);
    assert_eq!(pipeline.len().await, 3);

    let doc1 = pipeline.retrieve("vertex").await?;
    assert_eq!(doc1.content, "Vertex AI is Google Cloud's ML platform");
    Ok(())
}

#[tokio::test]
async fn empty_index_has_no_candidates() {
    let pipeline =
        RagPipeline::new(config(), KeywordEmbedder::default(), RecordingGenerator::new("ok"))
            .unwrap();

    let err = pipeline.answer("anything about vertex").await.unwrap_err();
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingError::NoCandidates)
    ));
    assert!(pipeline.generator().prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_answer_is_a_generation_error() {
    let pipeline =
        RagPipeline::new(config(), KeywordEmbedder::default(), RecordingGenerator::new("  "))
            .unwrap();
    pipeline.index_documents(documents()).await.unwrap();

    let err = pipeline.answer("vertex platform").await.unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
}

#[tokio::test]
async fn index_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config().with_index_path(dir.path().join("index/documents.json"));

    let pipeline = RagPipeline::open(
        config.clone(),
        KeywordEmbedder::default(),
        RecordingGenerator::new("ok"),
    )
    .await?;
    pipeline.index_documents(documents()).await?;
    assert!(pipeline.persist().await?);

    let reopened = RagPipeline::open(config, KeywordEmbedder::default(), RecordingGenerator::new("ok")).await?;
    assert_eq!(reopened.len().await, 2);
    assert!(reopened.contains("doc2").await);

    assert_eq!(reopened.index_documents(documents()).await?, 0);
    assert_eq!(reopened.embedder().calls.load(Ordering::SeqCst), 0);

    let hit = reopened.retrieve("rag search").await?;
    assert_eq!(hit.id, "doc2");
    Ok(())
}

#[tokio::test]
async fn mismatched_embedder_dimension_is_rejected() {
    let mut config = config();
    config.embedding.output_dimensionality = 8;
    let pipeline =
        RagPipeline::new(config, KeywordEmbedder::default(), RecordingGenerator::new("ok"))
            .unwrap();

    let err = pipeline.index_documents(documents()).await.unwrap_err();
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingError::DimensionMismatch {
            expected: 8,
            actual: 4
        })
    ));
    assert!(pipeline.is_empty().await);
}

/// Embeds each `predict` instance with its keyword vector.
struct KeywordPredictions;

impl Respond for KeywordPredictions {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let predictions: Vec<Value> = body["instances"]
            .as_array()
            .map(|instances| {
                instances
                    .iter()
                    .map(|instance| {
                        let text = instance["content"].as_str().unwrap_or_default();
                        json!({"embeddings": {"values": keyword_vector(text)}})
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({"predictions": predictions}))
    }
}

#[tokio::test]
async fn vertex_pipeline_end_to_end() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let models = "/v1/projects/demo/locations/us-central1/publishers/google/models";

    Mock::given(method("POST"))
        .and(path(format!("{models}/text-multilingual-embedding-002:predict")))
        .respond_with(KeywordPredictions)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{models}/gemini-2.0-flash:generateContent")))
        .and(body_string_contains("문서: RAG combines search and generation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Embed, retrieve, then generate."}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = VertexClient::new(
        VertexConfig::new("demo")
            .with_access_token("test-token")
            .with_base_url(server.uri()),
    )?;
    let pipeline = RagPipeline::vertex(client, config()).await?;

    assert_eq!(pipeline.index_documents(documents()).await?, 2);
    let answer = pipeline.answer("How do RAG search pipelines work?").await?;

    assert_eq!(answer.document.id, "doc2");
    assert_eq!(answer.answer, "Embed, retrieve, then generate.");

    // The repeated query text hits the embedding cache.
    pipeline.retrieve("How do RAG search pipelines work?").await?;
    let stats = pipeline.embedder().cache().stats().await;
    assert_eq!(stats.entries, 3);
    Ok(())
}

#[tokio::test]
async fn vertex_pipeline_embeds_documents_in_one_predict_call() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/demo/locations/us-central1/publishers/google/models/text-multilingual-embedding-002:predict",
        ))
        .respond_with(KeywordPredictions)
        .mount(&server)
        .await;

    let client = VertexClient::new(
        VertexConfig::new("demo")
            .with_access_token("test-token")
            .with_base_url(server.uri()),
    )?;
    let pipeline = RagPipeline::vertex(client, config()).await?;

    let docs = vec![
        Document::new("doc1", "Vertex AI is Google Cloud's ML platform"),
        Document::new("doc2", "RAG combines search and generation"),
        Document::new("doc3", "Search the platform"),
        Document::new("doc4", "Vertex search"),
    ];
    assert_eq!(pipeline.index_documents(docs).await?, 4);

    let predict_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().ends_with(":predict"))
        .count();
    assert_eq!(predict_calls, 1);
    Ok(())
}
