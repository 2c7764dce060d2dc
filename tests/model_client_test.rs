//! Tests for the OpenAI-compatible language model client

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use engagement_ai::config::ModelConfig;
use engagement_ai::error::{EngagementError, ErrorKind, TransportError};
use engagement_ai::memory::{FallbackDataset, InMemoryStore};
use engagement_ai::model::{HttpLanguageModel, LanguageModel};
use engagement_ai::service::{AiService, ServiceSettings};

fn config(server: &MockServer, timeout_ms: u64) -> ModelConfig {
    ModelConfig {
        base_url: format!("{}/v1/", server.uri()),
        api_key: Some("sk-test".to_string()),
        model: "test-model".to_string(),
        temperature: 0.2,
        timeout_ms,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn test_completion_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "Olá?" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Oi!")))
        .expect(1)
        .mount(&server)
        .await;

    let model = HttpLanguageModel::new(&config(&server, 2_000)).expect("client");
    assert_eq!(model.complete("Olá?").await.expect("completion"), "Oi!");
}

#[tokio::test]
async fn test_error_status_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let model = HttpLanguageModel::new(&config(&server, 2_000)).expect("client");
    let err = model.complete("Oi").await.expect_err("429");

    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(matches!(
        err,
        EngagementError::Transport(TransportError::Status { status: 429, .. })
    ));
}

#[tokio::test]
async fn test_missing_content_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let model = HttpLanguageModel::new(&config(&server, 2_000)).expect("client");
    let err = model.complete("Oi").await.expect_err("no choices");
    assert_eq!(err.kind(), ErrorKind::MalformedModelOutput);
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("tarde"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let model = HttpLanguageModel::new(&config(&server, 100)).expect("client");
    let err = model.complete("Oi").await.expect_err("timeout");
    assert!(matches!(err, EngagementError::Transport(TransportError::TimedOut(_))));
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let server = MockServer::start().await;
    let answer = r#"{"content":"Abrimos em breve!","confidence":0.8,"sources":["Como funciona a loja"],"suggestedActions":[]}"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(answer)))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    store.load(FallbackDataset::sample()).await;
    let model = HttpLanguageModel::new(&config(&server, 2_000)).expect("client");
    let service = AiService::new(store.clone(), Arc::new(model), ServiceSettings::default());

    let response = service
        .generate_response("mock-unit-1", "Quando abre?")
        .await
        .expect("answer");
    assert_eq!(response.content, "Abrimos em breve!");
    assert_eq!(store.interaction_count().await, 1);
}
