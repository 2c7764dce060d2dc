//! Tests for the test webhook client and the webhook testing flow

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use engagement_ai::config::{ModelConfig, WebhookConfig};
use engagement_ai::error::ErrorKind;
use engagement_ai::memory::{FallbackDataset, InMemoryStore};
use engagement_ai::model::HttpLanguageModel;
use engagement_ai::service::{AiService, ServiceSettings};
use engagement_ai::testing::AiTester;
use engagement_ai::webhook::{WebhookClient, WebhookPayload, ANSWER_NOT_FOUND};

const WEBHOOK_PATH: &str = "/webhook/teste_ia_assistente";

async fn tester(server: &MockServer, timeout_ms: u64) -> (AiTester, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    store.load(FallbackDataset::sample()).await;

    // the model is never called by webhook tests
    let model = HttpLanguageModel::new(&ModelConfig {
        base_url: server.uri(),
        ..ModelConfig::default()
    })
    .expect("model client");
    let service = AiService::new(store.clone(), Arc::new(model), ServiceSettings::default());

    let webhook = WebhookClient::new(&WebhookConfig {
        url: format!("{}{WEBHOOK_PATH}", server.uri()),
        timeout_ms,
    })
    .expect("webhook client");

    (AiTester::new(service, Some(webhook)), store)
}

#[tokio::test]
async fn test_payload_carries_unit_and_phase() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_partial_json(json!({
            "unidade_id": "mock-unit-1",
            "unidade_nome": "Unidade Centro",
            "unidade_codigo": "UC001",
            "fase_atual": "interacao",
            "pergunta": "Quando abre?"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "output": "Em breve!" }])))
        .expect(1)
        .mount(&server)
        .await;

    let (tester, store) = tester(&server, 2_000).await;
    let result = tester
        .test_via_webhook("mock-unit-1", "Quando abre?")
        .await
        .expect("webhook answered");

    assert!(result.success);
    assert_eq!(result.response, "Em breve!");
    assert_eq!(result.behavior_group_used, "Webhook");
    assert_eq!(result.phase_id.as_deref(), Some("fase-interacao"));
    assert!(result.webhook_data.is_some());
    // webhook runs never touch the audit trail
    assert_eq!(store.interaction_count().await, 0);
}

#[tokio::test]
async fn test_object_reply_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resposta": "Abrimos às 9h.",
            "confianca": 0.77,
            "fontes": ["Horários"],
            "grupo_comportamento": "Interação"
        })))
        .mount(&server)
        .await;

    let (tester, _) = tester(&server, 2_000).await;
    let result = tester.test_via_webhook("mock-unit-1", "Horário?").await.expect("answered");

    assert_eq!(result.response, "Abrimos às 9h.");
    assert!((result.confidence - 0.77).abs() < f64::EPSILON);
    assert_eq!(result.sources, vec!["Horários"]);
    assert_eq!(result.behavior_group_used, "Interação");
}

#[tokio::test]
async fn test_unrecognized_reply_uses_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let (tester, _) = tester(&server, 2_000).await;
    let result = tester.test_via_webhook("mock-unit-1", "Oi").await.expect("answered");
    assert_eq!(result.response, ANSWER_NOT_FOUND);
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
        .mount(&server)
        .await;

    let (tester, store) = tester(&server, 2_000).await;
    let failure = tester.test_via_webhook("mock-unit-1", "Oi").await.expect_err("500");

    assert_eq!(failure.kind(), ErrorKind::TransportFailure);
    assert!(!failure.result.success);
    assert!(failure
        .result
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("500")));
    assert_eq!(store.interaction_count().await, 0);
}

#[tokio::test]
async fn test_slow_webhook_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "output": "tarde demais" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let (tester, _) = tester(&server, 100).await;
    let failure = tester.test_via_webhook("mock-unit-1", "Oi").await.expect_err("timeout");
    assert_eq!(failure.kind(), ErrorKind::TransportFailure);
}

#[tokio::test]
async fn test_non_json_reply_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let (tester, _) = tester(&server, 2_000).await;
    let failure = tester.test_via_webhook("mock-unit-1", "Oi").await.expect_err("html");
    assert_eq!(failure.kind(), ErrorKind::MalformedModelOutput);
}

#[tokio::test]
async fn test_empty_query_never_posts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (tester, _) = tester(&server, 2_000).await;
    let failure = tester.test_via_webhook("mock-unit-1", "  ").await.expect_err("blank");
    assert_eq!(failure.kind(), ErrorKind::ValidationError);
}

#[tokio::test]
async fn test_client_sends_payload_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_partial_json(json!({ "fase_atual": "unknown" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebhookClient::new(&WebhookConfig {
        url: format!("{}{WEBHOOK_PATH}", server.uri()),
        timeout_ms: 2_000,
    })
    .expect("client");
    let unit = FallbackDataset::sample().units.remove(0);
    let payload = WebhookPayload::new(&unit, None, "Oi");

    let reply = client.send(&payload).await.expect("sent");
    assert_eq!(reply["response"], "ok");
}
