use std::path::Path;

use crate::error::{EngagementError, Result};

/// Longest accepted user query, in characters
pub const MAX_QUERY_CHARS: usize = 4000;
/// Longest accepted record id
pub const MAX_ID_LEN: usize = 128;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a record id supplied by a caller
    pub fn validate_id(entity: &str, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(EngagementError::validation(format!("{entity} id cannot be empty")));
        }

        if id.len() > MAX_ID_LEN {
            return Err(EngagementError::validation(format!(
                "{entity} id too long (max {MAX_ID_LEN} characters)"
            )));
        }

        if id.chars().any(char::is_control) {
            return Err(EngagementError::validation(format!(
                "{entity} id contains invalid characters"
            )));
        }

        Ok(())
    }

    /// Validate that a unit was selected
    pub fn validate_unit_id(unit_id: &str) -> Result<()> {
        Self::validate_id("unit", unit_id)
    }

    /// Validate a free-text query sent to the assistant
    pub fn validate_query(query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return Err(EngagementError::validation("query cannot be empty"));
        }

        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(EngagementError::validation(format!(
                "query too long (max {MAX_QUERY_CHARS} characters)"
            )));
        }

        if query.contains('\0') {
            return Err(EngagementError::validation("query contains invalid characters"));
        }

        Ok(())
    }

    /// Validate the text of a comment or Direct message
    pub fn validate_message_text(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(EngagementError::validation("message text cannot be empty"));
        }

        if text.contains('\0') {
            return Err(EngagementError::validation("message text contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a documentation title
    pub fn validate_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(EngagementError::validation("title cannot be empty"));
        }

        if title.chars().count() > 200 {
            return Err(EngagementError::validation("title too long (max 200 characters)"));
        }

        if title.contains(['\0', '\r', '\n']) {
            return Err(EngagementError::validation("title contains invalid characters"));
        }

        Ok(())
    }

    /// Validate an HTTP endpoint URL
    pub fn validate_http_url(url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(EngagementError::validation("URL cannot be empty"));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(EngagementError::validation("URL must start with http:// or https://"));
        }

        Ok(())
    }

    /// Validate file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.is_empty() {
            return Err(EngagementError::validation("File path cannot be empty"));
        }

        // Check for path traversal attempts
        if path_str.contains("..") || path_str.contains('~') {
            return Err(EngagementError::validation(
                "File path contains potentially dangerous characters",
            ));
        }

        if path_str.len() > 4096 {
            return Err(EngagementError::validation("File path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }
}
