//! Test webhook used by the AI assistant testing tool.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::WebhookConfig;
use crate::error::{EngagementError, Result, TransportError};
use crate::models::{Phase, Unit, UNKNOWN_PHASE};
use crate::validation::InputValidator;

/// Answer text used when the webhook reply has no recognizable answer field
pub const ANSWER_NOT_FOUND: &str = "Resposta não encontrada";
/// Behavior group label used when the webhook does not name one
pub const DEFAULT_GROUP_LABEL: &str = "Webhook";

/// JSON body posted to the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    /// Unit id
    pub unidade_id: String,
    /// Unit name
    pub unidade_nome: String,
    /// Unit code
    pub unidade_codigo: String,
    /// Current phase name, or "unknown"
    pub fase_atual: String,
    /// Question text
    pub pergunta: String,
    /// RFC 3339 send time
    pub timestamp: String,
}

impl WebhookPayload {
    /// Build the payload for a unit; an unresolved phase is sent as "unknown"
    #[must_use]
    pub fn new(unit: &Unit, phase: Option<&Phase>, query: &str) -> Self {
        Self {
            unidade_id: unit.id.clone(),
            unidade_nome: unit.name.clone(),
            unidade_codigo: unit.code.clone(),
            fase_atual: phase.map_or_else(|| UNKNOWN_PHASE.to_string(), |p| p.name.clone()),
            pergunta: query.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Fields pulled out of a webhook reply
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookAnswer {
    /// Answer text, or the not-found placeholder
    pub response: String,
    /// Reported confidence, 0 when absent
    pub confidence: f64,
    /// Reported sources
    pub sources: Vec<String>,
    /// Behavior group label
    pub behavior_group_used: String,
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Read the answer out of any of the reply shapes the webhook produces.
///
/// Answer lookup order: `[0].output`, `output`, `resposta`, `response`.
#[must_use]
pub fn extract_webhook_answer(reply: &Value) -> WebhookAnswer {
    let response = non_empty_str(reply.get(0).and_then(|first| first.get("output")))
        .or_else(|| non_empty_str(reply.get("output")))
        .or_else(|| non_empty_str(reply.get("resposta")))
        .or_else(|| non_empty_str(reply.get("response")))
        .unwrap_or(ANSWER_NOT_FOUND)
        .to_string();

    let confidence = ["confianca", "confidence"]
        .iter()
        .filter_map(|key| reply.get(key).and_then(Value::as_f64))
        .find(|c| *c != 0.0)
        .unwrap_or(0.0);

    let sources = ["fontes", "sources"]
        .iter()
        .find_map(|key| reply.get(key).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let behavior_group_used = non_empty_str(reply.get("grupo_comportamento"))
        .unwrap_or(DEFAULT_GROUP_LABEL)
        .to_string();

    WebhookAnswer {
        response,
        confidence,
        sources,
        behavior_group_used,
    }
}

/// HTTP client for the test webhook
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        InputValidator::validate_http_url(&config.url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EngagementError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: config.timeout(),
        })
    }

    /// Post a payload and return the decoded JSON reply
    pub async fn send(&self, payload: &WebhookPayload) -> Result<Value> {
        debug!(url = %self.url, unit_id = %payload.unidade_id, "Posting to test webhook");

        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        serde_json::from_str(&text).map_err(|e| EngagementError::malformed(format!("webhook reply is not JSON: {e}")))
    }

    fn transport_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::TimedOut(self.timeout)
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_output_wins() {
        let answer = extract_webhook_answer(&json!([{ "output": "Olá!" }]));
        assert_eq!(answer.response, "Olá!");
        assert_eq!(answer.behavior_group_used, DEFAULT_GROUP_LABEL);
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn object_shapes_are_tried_in_order() {
        let answer = extract_webhook_answer(&json!({ "resposta": "pt", "response": "en" }));
        assert_eq!(answer.response, "pt");

        let answer = extract_webhook_answer(&json!({ "output": "", "response": "en" }));
        assert_eq!(answer.response, "en");
    }

    #[test]
    fn unknown_shape_falls_back_to_placeholder() {
        let answer = extract_webhook_answer(&json!({ "message": "?" }));
        assert_eq!(answer.response, ANSWER_NOT_FOUND);
        assert!((answer.confidence - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn portuguese_metadata_keys_take_precedence() {
        let answer = extract_webhook_answer(&json!({
            "resposta": "ok",
            "confianca": 0.7,
            "confidence": 0.2,
            "fontes": ["Manual"],
            "sources": ["Other"],
            "grupo_comportamento": "Operação"
        }));
        assert!((answer.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(answer.sources, vec!["Manual"]);
        assert_eq!(answer.behavior_group_used, "Operação");
    }
}
