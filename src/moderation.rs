//! Comment moderation.
//!
//! Classification by the model is advisory. A decision only reaches the store
//! through [`ModerationService::apply`], which staff call after confirming it.

use chrono::Utc;
use tracing::info;

use crate::display::{group_comments_by_status, CommentBoard};
use crate::error::{EngagementError, Result};
use crate::models::{Classification, CommentClassification, InstagramComment, Timestamp};
use crate::service::AiService;
use crate::store::collections;
use crate::validation::InputValidator;

/// A moderation decision confirmed by staff
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationDecision {
    /// Final classification
    pub classification: Classification,
    /// Model confidence, when the decision was assisted
    pub confidence: Option<f64>,
    /// Reason given for the decision
    pub justification: Option<String>,
    /// Reply to post, if any
    pub suggested_response: Option<String>,
    /// Whether the comment should get a reply
    pub should_respond: bool,
    /// Whether the comment should be removed
    pub should_delete: bool,
}

impl ModerationDecision {
    /// A manual decision with no model metadata
    #[must_use]
    pub const fn manual(classification: Classification) -> Self {
        Self {
            classification,
            confidence: None,
            justification: None,
            suggested_response: None,
            should_respond: false,
            should_delete: false,
        }
    }
}

impl From<CommentClassification> for ModerationDecision {
    fn from(suggestion: CommentClassification) -> Self {
        Self {
            classification: suggestion.classification,
            confidence: Some(suggestion.confidence),
            justification: Some(suggestion.justification),
            suggested_response: suggestion.suggested_response,
            should_respond: suggestion.should_respond,
            should_delete: suggestion.should_delete,
        }
    }
}

/// Moderation workflow over stored Instagram comments
#[derive(Clone)]
pub struct ModerationService {
    service: AiService,
}

impl ModerationService {
    pub const fn new(service: AiService) -> Self {
        Self { service }
    }

    /// Store a newly received comment for a unit
    pub async fn ingest(
        &self,
        unit_id: &str,
        author: &str,
        content: &str,
        commented_at: Timestamp,
    ) -> Result<InstagramComment> {
        InputValidator::validate_unit_id(unit_id)?;
        InputValidator::validate_message_text(content)?;
        let store = self.service.store();
        if store.get_unit(unit_id).await?.is_none() {
            return Err(EngagementError::not_found(collections::UNITS, unit_id));
        }

        let comment = InstagramComment::ingested(unit_id, author.trim(), &InputValidator::sanitize_text(content), commented_at);
        store.save_comment(&comment).await?;
        Ok(comment)
    }

    /// Ask the model for a decision on a stored comment; nothing is persisted
    pub async fn suggest(&self, comment_id: &str) -> Result<CommentClassification> {
        let comment = self.load(comment_id).await?;
        self.service.classify_instagram_comment(&comment).await
    }

    /// Persist a confirmed decision.
    ///
    /// Approved and rejected comments are final; applying another decision to
    /// them is a validation error. Pending comments can be decided again.
    pub async fn apply(&self, comment_id: &str, decision: ModerationDecision) -> Result<InstagramComment> {
        let mut comment = self.load(comment_id).await?;

        if comment.is_terminal() {
            return Err(EngagementError::validation(format!(
                "comment {comment_id} is already {}",
                comment.classification.map_or("", Classification::as_str)
            )));
        }

        if let Some(confidence) = decision.confidence {
            if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
                return Err(EngagementError::validation(format!(
                    "confidence out of range: {confidence}"
                )));
            }
        }

        let now = Utc::now();
        comment.classification = Some(decision.classification);
        comment.confidence = decision.confidence;
        comment.justification = decision.justification;
        comment.suggested_response = decision.suggested_response;
        comment.should_respond = Some(decision.should_respond);
        comment.should_delete = Some(decision.should_delete);
        comment.processed_at = Some(now);
        comment.updated_at = Some(now);

        self.service.store().save_comment(&comment).await?;
        info!(
            comment_id,
            classification = %decision.classification,
            "Moderation decision applied"
        );
        Ok(comment)
    }

    /// Comments of a unit grouped by moderation status
    pub async fn board(&self, unit_id: &str) -> Result<CommentBoard> {
        InputValidator::validate_unit_id(unit_id)?;
        let comments = self.service.store().comments_for_unit(unit_id).await?;
        Ok(group_comments_by_status(comments))
    }

    async fn load(&self, comment_id: &str) -> Result<InstagramComment> {
        InputValidator::validate_id("comment", comment_id)?;
        self.service
            .store()
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(collections::COMMENTS, comment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{FallbackDataset, InMemoryStore};
    use crate::model::MockLanguageModel;
    use crate::service::ServiceSettings;
    use std::sync::Arc;

    async fn moderation() -> ModerationService {
        let store = Arc::new(InMemoryStore::new());
        store.load(FallbackDataset::sample()).await;
        let service = AiService::new(store, Arc::new(MockLanguageModel::new()), ServiceSettings::default());
        ModerationService::new(service)
    }

    #[tokio::test]
    async fn approved_comments_are_final() {
        let moderation = moderation().await;
        let applied = moderation
            .apply("mock-comment-1", ModerationDecision::manual(Classification::Approved))
            .await
            .expect("first decision");
        assert!(applied.processed_at.is_some());
        assert_eq!(applied.should_delete, Some(false));

        let err = moderation
            .apply("mock-comment-1", ModerationDecision::manual(Classification::Rejected))
            .await
            .expect_err("terminal");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn pending_comments_can_be_decided_again() {
        let moderation = moderation().await;
        moderation
            .apply("mock-comment-1", ModerationDecision::manual(Classification::Pending))
            .await
            .expect("pending");
        let comment = moderation
            .apply("mock-comment-1", ModerationDecision::manual(Classification::Rejected))
            .await
            .expect("final decision");
        assert_eq!(comment.classification, Some(Classification::Rejected));
    }

    #[tokio::test]
    async fn unknown_comment_is_not_found() {
        let err = moderation()
            .await
            .apply("nope", ModerationDecision::manual(Classification::Approved))
            .await
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn ingest_requires_an_existing_unit() {
        let moderation = moderation().await;
        let err = moderation
            .ingest("ghost", "@ana", "Oi", Utc::now())
            .await
            .expect_err("missing unit");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        moderation
            .ingest("mock-unit-1", "@ana", "Amei!", Utc::now())
            .await
            .expect("ingested");
        let board = moderation.board("mock-unit-1").await.expect("board");
        assert_eq!(board.pending.len(), 2);
    }
}
