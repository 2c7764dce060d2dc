//! AI testing tool.
//!
//! Unlike [`AiService`], the tester records failed runs: a failed
//! [`AiTester::test_ai`] appends one interaction entry with `success = false`.

use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{EngagementError, ErrorKind};
use crate::metrics::MetricsCollector;
use crate::models::{AiContext, AiTestResult, NewInteraction};
use crate::service::AiService;
use crate::store::collections;
use crate::validation::InputValidator;
use crate::webhook::{extract_webhook_answer, WebhookClient, WebhookPayload, DEFAULT_GROUP_LABEL};

/// Label used when the tested unit has no behavior group
pub const NO_BEHAVIOR_GROUP: &str = "Nenhum";

/// A failed test run: the recorded result and the error behind it
#[derive(Debug, Error)]
#[error("AI test failed: {error}")]
pub struct AiTestFailure {
    /// Result as shown to staff, with `success = false`
    pub result: Box<AiTestResult>,
    /// Cause of the failure
    #[source]
    pub error: EngagementError,
}

impl AiTestFailure {
    /// Caller-facing kind of the underlying error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Outcome of one test run
pub type TestOutcome = std::result::Result<AiTestResult, AiTestFailure>;

/// Runs test queries against the pipeline or the test webhook
pub struct AiTester {
    service: AiService,
    webhook: Option<WebhookClient>,
    metrics: MetricsCollector,
}

impl AiTester {
    /// Create a tester; `webhook` is only needed for webhook runs
    pub fn new(service: AiService, webhook: Option<WebhookClient>) -> Self {
        Self {
            service,
            webhook,
            metrics: MetricsCollector::default(),
        }
    }

    /// Run a query through the answer pipeline and report it; the context
    /// shown on the result is the one the prompt was built from
    pub async fn test_ai(&self, unit_id: &str, query: &str) -> TestOutcome {
        let started = Instant::now();
        let mut result = blank_result(unit_id, query, NO_BEHAVIOR_GROUP);

        let context = match self.service.assemble_context(unit_id).await {
            Ok(context) => context,
            Err(error) => return Err(self.fail(result, error, started).await),
        };
        result.phase_id = context.phase_id.clone();
        result.behavior_group_used = group_label(&context);

        match self.service.generate_response_with_context(context, query).await {
            Ok(response) => {
                result.response = response.content;
                result.confidence = response.confidence;
                result.sources = response.sources;
                result.response_time_ms = elapsed_ms(started);
                result.success = true;
                info!(unit_id, response_time_ms = result.response_time_ms, "AI test passed");
                Ok(result)
            }
            Err(error) => Err(self.fail(result, error, started).await),
        }
    }

    /// Send a query to the test webhook and report the answer it gave
    pub async fn test_via_webhook(&self, unit_id: &str, query: &str) -> TestOutcome {
        let started = Instant::now();
        let mut result = blank_result(unit_id, query, DEFAULT_GROUP_LABEL);

        let reply = async {
            InputValidator::validate_unit_id(unit_id)?;
            InputValidator::validate_query(query)?;
            let webhook = self
                .webhook
                .as_ref()
                .ok_or_else(|| EngagementError::InvalidConfig("test webhook is not configured".into()))?;

            let store = self.service.store();
            let unit = store
                .get_unit(unit_id)
                .await?
                .ok_or_else(|| EngagementError::not_found(collections::UNITS, unit_id))?;
            let phase = match unit.phase_ref() {
                Some(phase_id) => store.get_phase(phase_id).await?,
                None => None,
            };

            let payload = WebhookPayload::new(&unit, phase.as_ref(), query);
            let reply = webhook.send(&payload).await?;
            Ok::<_, EngagementError>((unit.phase_ref().map(str::to_string), reply))
        }
        .await;

        result.response_time_ms = elapsed_ms(started);
        match reply {
            Ok((phase_id, reply)) => {
                let answer = extract_webhook_answer(&reply);
                result.phase_id = phase_id;
                result.response = answer.response;
                result.confidence = answer.confidence;
                result.sources = answer.sources;
                result.behavior_group_used = answer.behavior_group_used;
                result.webhook_data = Some(reply);
                result.success = true;
                Ok(result)
            }
            Err(error) => {
                warn!(unit_id, kind = error.kind().as_str(), error = %error, "Webhook test failed");
                result.error_message = Some(error.to_string());
                Err(AiTestFailure {
                    result: Box::new(result),
                    error,
                })
            }
        }
    }

    /// Record a failed run; input and unknown-unit failures are not logged
    async fn fail(&self, mut result: AiTestResult, error: EngagementError, started: Instant) -> AiTestFailure {
        result.response_time_ms = elapsed_ms(started);
        result.error_message = Some(error.to_string());
        warn!(unit_id = %result.unit_id, kind = error.kind().as_str(), error = %error, "AI test failed");

        if !matches!(error.kind(), ErrorKind::ValidationError | ErrorKind::NotFound) {
            let entry = NewInteraction {
                unit_id: result.unit_id.clone(),
                user_id: self.service.settings().system_user_id.clone(),
                query: result.query.clone(),
                response: String::new(),
                phase_id: result.phase_id.clone(),
                success: false,
                latency_ms: result.response_time_ms,
                confidence: 0.0,
                sources: Vec::new(),
            };
            match self.service.store().append_interaction(entry).await {
                Ok(_) => self.metrics.record_interaction_logged(false),
                Err(log_error) => warn!(error = %log_error, "Failed to record failed AI test"),
            }
        }

        AiTestFailure {
            result: Box::new(result),
            error,
        }
    }
}

fn blank_result(unit_id: &str, query: &str, group: &str) -> AiTestResult {
    AiTestResult {
        unit_id: unit_id.to_string(),
        phase_id: None,
        query: query.to_string(),
        response: String::new(),
        response_time_ms: 0,
        confidence: 0.0,
        sources: Vec::new(),
        behavior_group_used: group.to_string(),
        timestamp: Utc::now(),
        success: false,
        error_message: None,
        webhook_data: None,
    }
}

fn group_label(context: &AiContext) -> String {
    context
        .behavior_group
        .as_ref()
        .map_or_else(|| NO_BEHAVIOR_GROUP.to_string(), |group| group.description.clone())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FallbackDataset, InMemoryStore};
    use crate::model::MockLanguageModel;
    use crate::service::ServiceSettings;
    use crate::store::RecordStore;
    use std::sync::Arc;

    async fn tester(model: MockLanguageModel) -> (AiTester, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.load(FallbackDataset::sample()).await;
        let service = AiService::new(store.clone(), Arc::new(model), ServiceSettings::default());
        (AiTester::new(service, None), store)
    }

    #[tokio::test]
    async fn failed_run_is_logged_with_success_false() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .returning(|_| Ok("não sei responder".to_string()));
        let (tester, store) = tester(model).await;

        let failure = tester
            .test_ai("mock-unit-1", "Quanto custa?")
            .await
            .expect_err("malformed reply");

        assert_eq!(failure.kind(), ErrorKind::MalformedModelOutput);
        assert!(!failure.result.success);
        assert!(failure.result.error_message.is_some());

        let history = store.recent_interactions("mock-unit-1", 10).await.expect("history");
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert!(history[0].response.is_empty());
        assert!((history[0].confidence - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn successful_run_reports_group_and_phase() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().returning(|_| {
            Ok(r#"{"content":"Em breve!","confidence":0.8,"sources":["Doc"],"suggestedActions":[]}"#.to_string())
        });
        let (tester, store) = tester(model).await;

        let result = tester.test_ai("mock-unit-1", "Quando abre?").await.expect("passes");
        assert!(result.success);
        assert_eq!(result.phase_id.as_deref(), Some("fase-interacao"));
        assert_ne!(result.behavior_group_used, NO_BEHAVIOR_GROUP);
        assert_eq!(store.interaction_count().await, 1);
    }

    #[tokio::test]
    async fn context_is_assembled_once_per_run() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(1).returning(|_| {
            Ok(r#"{"content":"Em breve!","confidence":0.8,"sources":[],"suggestedActions":[]}"#.to_string())
        });
        let store = Arc::new(InMemoryStore::observed());
        store.load(FallbackDataset::sample()).await;
        let service = AiService::new(store.clone(), Arc::new(model), ServiceSettings::default());

        AiTester::new(service, None)
            .test_ai("mock-unit-1", "Quando abre?")
            .await
            .expect("passes");

        // unit, phase, groups, documentation and history
        assert_eq!(store.fallback_reads(), 5);
    }

    #[tokio::test]
    async fn unknown_unit_is_not_logged() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(0);
        let (tester, store) = tester(model).await;

        let failure = tester.test_ai("does-not-exist", "Oi").await.expect_err("missing unit");
        assert_eq!(failure.kind(), ErrorKind::NotFound);
        assert_eq!(store.interaction_count().await, 0);
    }

    #[tokio::test]
    async fn webhook_test_without_client_is_a_configuration_error() {
        let (tester, _) = tester(MockLanguageModel::new()).await;
        let failure = tester
            .test_via_webhook("mock-unit-1", "Oi")
            .await
            .expect_err("no webhook");
        assert_eq!(failure.kind(), ErrorKind::Configuration);
        assert_eq!(failure.result.behavior_group_used, DEFAULT_GROUP_LABEL);
    }
}
