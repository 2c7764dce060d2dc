//! AI pipeline service.
//!
//! Each operation is one sequential pipeline: context assembly, prompt
//! synthesis, a single model call under a hard timeout, and strict parsing of
//! the reply. Only [`AiService::generate_response`] writes to the store, and
//! only after a valid answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::context::ContextAssembler;
use crate::error::{EngagementError, Result, TransportError};
use crate::interpreter::{parse_ai_response, parse_comment_classification, parse_recommendations};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::model::LanguageModel;
use crate::models::{AiContext, AiResponse, CommentClassification, InstagramComment, NewInteraction};
use crate::prompt::{synthesize_classification_prompt, synthesize_prompt, synthesize_recommendations_prompt};
use crate::store::RecordStore;
use crate::validation::InputValidator;

/// Runtime knobs of the pipeline
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Hard timeout of one model call
    pub model_timeout: Duration,
    /// User id written on interaction entries logged by the pipeline
    pub system_user_id: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(8),
            system_user_id: "system".to_string(),
        }
    }
}

impl ServiceSettings {
    /// Take the pipeline settings from the application config
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model_timeout: config.model.timeout(),
            system_user_id: config.service.system_user_id.clone(),
        }
    }
}

/// Service layer for AI answers, comment classification and recommendations
#[derive(Clone)]
pub struct AiService {
    store: Arc<dyn RecordStore>,
    model: Arc<dyn LanguageModel>,
    assembler: ContextAssembler,
    settings: ServiceSettings,
    metrics: MetricsCollector,
}

impl AiService {
    /// Create a new service with injected collaborators
    pub fn new(store: Arc<dyn RecordStore>, model: Arc<dyn LanguageModel>, settings: ServiceSettings) -> Self {
        Self {
            assembler: ContextAssembler::new(Arc::clone(&store)),
            store,
            model,
            settings,
            metrics: MetricsCollector::default(),
        }
    }

    /// The record store this service reads and writes
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Pipeline settings
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Assemble the model context of a unit
    pub async fn assemble_context(&self, unit_id: &str) -> Result<AiContext> {
        InputValidator::validate_unit_id(unit_id)?;
        self.assembler.assemble(unit_id).await
    }

    /// Answer a query on behalf of a unit and log the interaction
    pub async fn generate_response(&self, unit_id: &str, query: &str) -> Result<AiResponse> {
        self.generate_response_cancellable(unit_id, query, &CancellationToken::new())
            .await
    }

    /// [`generate_response`](Self::generate_response) with caller-driven
    /// cancellation
    #[instrument(skip(self, query, cancel))]
    pub async fn generate_response_cancellable(
        &self,
        unit_id: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<AiResponse> {
        let timer = MetricsTimer::new(self.metrics.clone(), "generate_response");
        let result = async {
            InputValidator::validate_unit_id(unit_id)?;
            InputValidator::validate_query(query)?;
            let context = self.assembler.assemble_cancellable(unit_id, cancel).await?;
            self.answer(context, query, cancel).await
        }
        .await;
        report_answer(timer, &result);
        result
    }

    /// Answer a query from a context the caller already assembled and log
    /// the interaction
    #[instrument(skip_all, fields(unit_id = %context.unit_id))]
    pub async fn generate_response_with_context(&self, context: AiContext, query: &str) -> Result<AiResponse> {
        let timer = MetricsTimer::new(self.metrics.clone(), "generate_response");
        let result = async {
            InputValidator::validate_query(query)?;
            self.answer(context, query, &CancellationToken::new()).await
        }
        .await;
        report_answer(timer, &result);
        result
    }

    async fn answer(&self, context: AiContext, query: &str, cancel: &CancellationToken) -> Result<AiResponse> {
        let prompt = synthesize_prompt(&context, query);

        let started = Instant::now();
        let raw = self.call_model(&prompt, cancel).await?;
        let response = parse_ai_response(&raw)?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let phase_id = context
            .behavior_group
            .as_ref()
            .map(|group| group.phase_id.clone())
            .or(context.phase_id);

        self.store
            .append_interaction(NewInteraction {
                unit_id: context.unit_id,
                user_id: self.settings.system_user_id.clone(),
                query: query.to_string(),
                response: response.content.clone(),
                phase_id,
                success: true,
                latency_ms,
                confidence: response.confidence,
                sources: response.sources.clone(),
            })
            .await?;
        self.metrics.record_interaction_logged(true);

        Ok(response)
    }

    /// Suggest a moderation decision for a comment; nothing is persisted
    pub async fn classify_instagram_comment(&self, comment: &InstagramComment) -> Result<CommentClassification> {
        self.classify_instagram_comment_cancellable(comment, &CancellationToken::new())
            .await
    }

    /// [`classify_instagram_comment`](Self::classify_instagram_comment) with
    /// caller-driven cancellation
    #[instrument(skip_all, fields(comment_id = %comment.id, unit_id = %comment.unit_id))]
    pub async fn classify_instagram_comment_cancellable(
        &self,
        comment: &InstagramComment,
        cancel: &CancellationToken,
    ) -> Result<CommentClassification> {
        let timer = MetricsTimer::new(self.metrics.clone(), "classify_comment");
        let result = async {
            InputValidator::validate_unit_id(&comment.unit_id)?;
            InputValidator::validate_message_text(&comment.content)?;

            let context = self.assembler.assemble_cancellable(&comment.unit_id, cancel).await?;
            let prompt = synthesize_classification_prompt(&context, comment);
            let raw = self.call_model(&prompt, cancel).await?;
            parse_comment_classification(&raw)
        }
        .await;
        timer.finish(&result);

        match &result {
            Ok(classification) => {
                self.metrics
                    .record_classification(classification.classification.as_str());
                info!(
                    classification = %classification.classification,
                    confidence = classification.confidence,
                    "Comment classified"
                );
            }
            Err(e) => warn!(kind = e.kind().as_str(), error = %e, "Comment classification failed"),
        }
        result
    }

    /// Ask the model for operational recommendations for a unit
    pub async fn generate_unit_recommendations(&self, unit_id: &str) -> Result<Vec<String>> {
        self.generate_unit_recommendations_cancellable(unit_id, &CancellationToken::new())
            .await
    }

    /// [`generate_unit_recommendations`](Self::generate_unit_recommendations)
    /// with caller-driven cancellation
    #[instrument(skip(self, cancel))]
    pub async fn generate_unit_recommendations_cancellable(
        &self,
        unit_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let timer = MetricsTimer::new(self.metrics.clone(), "recommendations");
        let result = async {
            InputValidator::validate_unit_id(unit_id)?;
            let context = self.assembler.assemble_cancellable(unit_id, cancel).await?;
            let prompt = synthesize_recommendations_prompt(&context);
            let raw = self.call_model(&prompt, cancel).await?;
            parse_recommendations(&raw)
        }
        .await;
        timer.finish(&result);

        if let Err(e) = &result {
            warn!(kind = e.kind().as_str(), error = %e, "Recommendations failed");
        }
        result
    }

    /// The single suspension point of every pipeline
    async fn call_model(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        let timeout = self.settings.model_timeout;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngagementError::Cancelled),
            reply = tokio::time::timeout(timeout, self.model.complete(prompt)) => {
                reply.map_err(|_| EngagementError::from(TransportError::TimedOut(timeout)))?
            }
        }
    }
}

fn report_answer(timer: MetricsTimer, result: &Result<AiResponse>) {
    let elapsed = timer.finish(result);
    match result {
        Ok(response) => info!(
            confidence = response.confidence,
            duration_ms = elapsed.as_millis() as u64,
            "AI response generated"
        ),
        Err(e) => warn!(kind = e.kind().as_str(), error = %e, "AI response failed"),
    }
}
