//! Presentation helpers shared by the CLI and any dashboard front end.

use serde::Serialize;

use crate::models::{Classification, InstagramComment};
use crate::phases;

/// Confidence as a whole percentage.
///
/// Values above 1 are already percentages and are not scaled again.
#[must_use]
pub fn confidence_percent(confidence: f64) -> f64 {
    let percent = if confidence > 1.0 { confidence } else { confidence * 100.0 };
    percent.round()
}

/// Confidence rendered as `"85%"`
#[must_use]
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence_percent(confidence))
}

/// Display name of a raw phase name, unknown names shown as themselves
#[must_use]
pub fn phase_label(phase_name: &str) -> &str {
    phases::display_name(phase_name)
}

/// Comments of a unit split by moderation status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentBoard {
    pub pending: Vec<InstagramComment>,
    pub approved: Vec<InstagramComment>,
    pub rejected: Vec<InstagramComment>,
}

impl CommentBoard {
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending.len() + self.approved.len() + self.rejected.len()
    }
}

/// Bucket comments by classification; unclassified comments are pending
#[must_use]
pub fn group_comments_by_status(comments: Vec<InstagramComment>) -> CommentBoard {
    let mut board = CommentBoard::default();
    for comment in comments {
        match comment.classification {
            Some(Classification::Approved) => board.approved.push(comment),
            Some(Classification::Rejected) => board.rejected.push(comment),
            Some(Classification::Pending) | None => board.pending.push(comment),
        }
    }
    board
}
