//! Database schema definitions
//!
//! Table names and column lists used by the SQLite record store. Every
//! `COLUMNS` list is the select order the row mappers in `db` rely on.

/// Units table schema
pub mod units {
    /// Table name
    pub const TABLE: &str = "units";
    /// Columns in select order
    pub const COLUMNS: &str = "id, name, code, location, current_phase_id, status, created_at, updated_at";
}

/// Phases table schema
pub mod phases {
    /// Table name
    pub const TABLE: &str = "phases";
    /// Columns in select order
    pub const COLUMNS: &str = "id, name, order_index, color, active, created_at, updated_at";
}

/// Behavior groups table schema
pub mod behavior_groups {
    /// Table name
    pub const TABLE: &str = "behavior_groups";
    /// Columns in select order; `scope` holds JSON
    pub const COLUMNS: &str =
        "id, phase_id, description, may_respond, active, default_reply, scope, created_at, updated_at";
}

/// Documentation table schema
pub mod documentation {
    /// Table name
    pub const TABLE: &str = "documentation";
    /// Columns in select order
    pub const COLUMNS: &str = "id, title, content, kind, active, created_at, updated_at";
}

/// Documentation to phase links
pub mod documentation_phase_links {
    /// Table name
    pub const TABLE: &str = "documentation_phase_links";
    /// Columns in select order
    pub const COLUMNS: &str = "id, phase_id, documentation_id, priority, created_at";
}

/// Interaction history table schema, append-only
pub mod interaction_history {
    /// Table name
    pub const TABLE: &str = "interaction_history";
    /// Columns in select order; `sources` holds a JSON array
    pub const COLUMNS: &str =
        "id, unit_id, user_id, query, response, phase_id, success, latency_ms, confidence, sources, created_at";
}

/// Instagram comments table schema
pub mod instagram_comments {
    /// Table name
    pub const TABLE: &str = "instagram_comments";
    /// Columns in select order
    pub const COLUMNS: &str = "id, unit_id, content, author, commented_at, classification, confidence, \
         justification, suggested_response, should_respond, should_delete, processed_at, created_at, updated_at";
}

/// Direct conversations table schema
pub mod direct_conversations {
    /// Table name
    pub const TABLE: &str = "direct_conversations";
    /// Columns in select order; `messages`, `metadata` and `ai_suggestions` hold JSON
    pub const COLUMNS: &str = "id, unit_id, external_user_id, display_name, messages, unread_count, \
         total_count, status, metadata, ai_suggestions, created_at, updated_at";
}

/// Number of placeholders (`?1, ?2, ...`) for a column list
#[must_use]
pub fn placeholders(columns: &str) -> String {
    (1..=columns.split(',').count())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_match_column_count() {
        assert_eq!(placeholders(phases::COLUMNS), "?1, ?2, ?3, ?4, ?5, ?6, ?7");
        assert_eq!(placeholders(instagram_comments::COLUMNS).split(", ").count(), 14);
    }
}
