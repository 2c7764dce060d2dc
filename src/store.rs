//! Record store access.
//!
//! The backend is an opaque document/record store reached through
//! [`RecordStore`]. The process entry point owns the store and injects it into
//! the services as `Arc<dyn RecordStore>`; tests substitute an
//! [`InMemoryStore`].

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::db::SqliteStore;
use crate::error::{EngagementError, Result};
use crate::memory::{FallbackDataset, InMemoryStore};
use crate::models::{
    BehaviorGroup, DirectConversation, Documentation, DocumentationPhaseLink, InstagramComment,
    InteractionHistoryEntry, NewInteraction, Phase, Unit,
};

/// Collections of the record store
pub mod collections {
    /// Units
    pub const UNITS: &str = "unit";
    /// Phases
    pub const PHASES: &str = "phase";
    /// Behavior groups
    pub const BEHAVIOR_GROUPS: &str = "behavior_group";
    /// Documentation
    pub const DOCUMENTATION: &str = "documentation";
    /// Documentation to phase links
    pub const DOCUMENTATION_LINKS: &str = "documentation_phase_link";
    /// Interaction history
    pub const INTERACTIONS: &str = "interaction_history";
    /// Instagram comments
    pub const COMMENTS: &str = "instagram_comment";
    /// Direct conversations
    pub const CONVERSATIONS: &str = "direct_conversation";
}

/// Point lookups, ordered foreign-key lists and single-row writes.
///
/// Every write touches exactly one row; no operation needs a transaction
/// spanning several rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a unit by id
    async fn get_unit(&self, id: &str) -> Result<Option<Unit>>;
    /// All units, most recently created first
    async fn list_units(&self) -> Result<Vec<Unit>>;
    /// Insert or replace a unit
    async fn save_unit(&self, unit: &Unit) -> Result<()>;

    /// Look up a phase by id
    async fn get_phase(&self, id: &str) -> Result<Option<Phase>>;
    /// All phases in progression order
    async fn list_phases(&self) -> Result<Vec<Phase>>;
    /// Insert or replace a phase
    async fn save_phase(&self, phase: &Phase) -> Result<()>;

    /// Behavior groups of a phase, by id ascending
    async fn behavior_groups_for_phase(&self, phase_id: &str) -> Result<Vec<BehaviorGroup>>;
    /// Insert or replace a behavior group
    async fn save_behavior_group(&self, group: &BehaviorGroup) -> Result<()>;

    /// Documentation linked to a phase, by link priority then documentation id
    async fn documentation_for_phase(&self, phase_id: &str) -> Result<Vec<Documentation>>;
    /// Links of a phase, by priority then id
    async fn documentation_links_for_phase(&self, phase_id: &str) -> Result<Vec<DocumentationPhaseLink>>;
    /// Insert or replace a documentation item
    async fn save_documentation(&self, documentation: &Documentation) -> Result<()>;
    /// Insert or replace a documentation link
    async fn save_documentation_link(&self, link: &DocumentationPhaseLink) -> Result<()>;

    /// Most recent interactions of a unit, newest first
    async fn recent_interactions(&self, unit_id: &str, limit: usize) -> Result<Vec<InteractionHistoryEntry>>;
    /// Append an interaction; entries are never updated afterwards
    async fn append_interaction(&self, interaction: NewInteraction) -> Result<InteractionHistoryEntry>;

    /// Look up a comment by id
    async fn get_comment(&self, id: &str) -> Result<Option<InstagramComment>>;
    /// Comments of a unit, newest comment first
    async fn comments_for_unit(&self, unit_id: &str) -> Result<Vec<InstagramComment>>;
    /// Insert or replace a comment
    async fn save_comment(&self, comment: &InstagramComment) -> Result<()>;

    /// Look up a Direct conversation by id
    async fn get_conversation(&self, id: &str) -> Result<Option<DirectConversation>>;
    /// Conversations of a unit, most recently updated first
    async fn conversations_for_unit(&self, unit_id: &str) -> Result<Vec<DirectConversation>>;
    /// Insert or replace a conversation
    async fn save_conversation(&self, conversation: &DirectConversation) -> Result<()>;
}

/// Where records come from, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The SQLite record store
    Live,
    /// In-memory sample data; every read is counted and logged
    Fallback,
}

impl FromStr for DataSource {
    type Err = EngagementError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "fallback" => Ok(Self::Fallback),
            other => Err(EngagementError::InvalidConfig(format!(
                "unknown data source: {other} (expected live or fallback)"
            ))),
        }
    }
}

impl DataSource {
    /// Open the record store selected by the configuration
    pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
        let source: Self = config.data_source.parse()?;
        match source {
            Self::Live => {
                info!(url = %config.database_url, "Opening live record store");
                let store = SqliteStore::open(&config.database_url, config.max_connections)?;
                Ok(Arc::new(store))
            }
            Self::Fallback => {
                let dataset = match &config.fixture_path {
                    Some(path) => FallbackDataset::from_yaml_file(Path::new(path))?,
                    None => FallbackDataset::sample(),
                };
                warn!(
                    units = dataset.units.len(),
                    "Using fallback record store; data is not persisted"
                );
                let store = InMemoryStore::observed();
                store.load(dataset).await;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_parses_case_insensitively() {
        assert_eq!("LIVE".parse::<DataSource>().ok(), Some(DataSource::Live));
        assert_eq!("fallback".parse::<DataSource>().ok(), Some(DataSource::Fallback));
        assert!("mock".parse::<DataSource>().is_err());
    }

    #[tokio::test]
    async fn fallback_source_serves_sample_units() {
        let config = StoreConfig {
            data_source: "fallback".into(),
            ..StoreConfig::default()
        };
        let store = DataSource::open(&config).await.expect("fallback store");
        let units = store.list_units().await.expect("units");
        assert!(!units.is_empty());
    }
}
