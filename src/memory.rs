//! In-memory record store.
//!
//! Used as the test fake and as the [`DataSource::Fallback`](crate::store::DataSource)
//! backend. An observed store counts and logs every read so fallback data is
//! never served silently.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::models::{
    BehaviorGroup, BehaviorScope, ConversationStatus, DirectConversation, DirectMessage, Documentation,
    DocumentationKind, DocumentationPhaseLink, InstagramComment, InteractionHistoryEntry, NewInteraction,
    Phase, PhaseName, RestrictionTag, Sender, Unit, UnitStatus,
};
use crate::store::{collections, RecordStore};

/// Records used to seed an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FallbackDataset {
    /// Units
    pub units: Vec<Unit>,
    /// Phases
    pub phases: Vec<Phase>,
    /// Behavior groups
    pub behavior_groups: Vec<BehaviorGroup>,
    /// Documentation items
    pub documentation: Vec<Documentation>,
    /// Documentation to phase links
    pub documentation_links: Vec<DocumentationPhaseLink>,
    /// Interaction history
    pub interactions: Vec<InteractionHistoryEntry>,
    /// Instagram comments
    pub comments: Vec<InstagramComment>,
    /// Direct conversations
    pub conversations: Vec<DirectConversation>,
}

impl FallbackDataset {
    /// Load a dataset from a YAML fixture
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Built-in sample data: one unit, the nine phases and a little content
    #[must_use]
    pub fn sample() -> Self {
        let now = Utc::now();

        let phases: Vec<Phase> = PhaseName::ALL
            .iter()
            .zip(1..)
            .map(|(name, order)| Phase {
                id: format!("fase-{}", name.as_str()),
                name: name.as_str().to_string(),
                order,
                color: "#ec4899".to_string(),
                active: true,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let interaction_phase = format!("fase-{}", PhaseName::Interaction.as_str());

        let unit = Unit {
            id: "mock-unit-1".to_string(),
            name: "Unidade Centro".to_string(),
            code: "UC001".to_string(),
            location: "Centro da Cidade".to_string(),
            current_phase_id: Some(interaction_phase.clone()),
            status: UnitStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let group = BehaviorGroup {
            id: "mock-group-1".to_string(),
            phase_id: interaction_phase.clone(),
            description: "Acolher a comunidade e coletar interesse sem revelar preços".to_string(),
            may_respond: true,
            active: true,
            default_reply: Some("Obrigado pelo contato! Em breve teremos novidades.".to_string()),
            scope: BehaviorScope {
                restrictions: [RestrictionTag::NoPriceDisclosure, RestrictionTag::NoSalesClosing]
                    .into_iter()
                    .collect(),
                allowed_questions: vec!["Quando a loja abre?".to_string()],
            },
            created_at: now,
            updated_at: now,
        };

        let doc = Documentation {
            id: "mock-doc-1".to_string(),
            title: "Como funciona a loja".to_string(),
            content: "A loja compra e vende roupas infantis seminovas avaliadas na hora.".to_string(),
            kind: DocumentationKind::PerPhase,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let link = DocumentationPhaseLink {
            id: "mock-link-1".to_string(),
            phase_id: interaction_phase,
            documentation_id: doc.id.clone(),
            priority: 1,
            created_at: now,
        };

        let mut comment = InstagramComment::ingested(&unit.id, "@usuario_ig", "Quando vai abrir?", now);
        comment.id = "mock-comment-1".to_string();

        let conversation = DirectConversation {
            id: "mock-direct-1".to_string(),
            unit_id: unit.id.clone(),
            external_user_id: "123456".to_string(),
            display_name: Some("Usuário Direct".to_string()),
            messages: vec![
                DirectMessage {
                    id: "m1".to_string(),
                    sender: Sender::Them,
                    text: "Oi, tudo bem?".to_string(),
                    timestamp: now - Duration::minutes(1),
                },
                DirectMessage {
                    id: "m2".to_string(),
                    sender: Sender::Me,
                    text: "Olá! Como posso ajudar?".to_string(),
                    timestamp: now,
                },
            ],
            unread_count: 1,
            total_count: 2,
            status: ConversationStatus::Active,
            metadata: serde_json::json!({}),
            ai_suggestions: None,
            created_at: now,
            updated_at: now,
        };

        Self {
            units: vec![unit],
            phases,
            behavior_groups: vec![group],
            documentation: vec![doc],
            documentation_links: vec![link],
            interactions: Vec::new(),
            comments: vec![comment],
            conversations: vec![conversation],
        }
    }
}

#[derive(Default)]
struct Tables {
    units: BTreeMap<String, Unit>,
    phases: BTreeMap<String, Phase>,
    behavior_groups: BTreeMap<String, BehaviorGroup>,
    documentation: BTreeMap<String, Documentation>,
    documentation_links: BTreeMap<String, DocumentationPhaseLink>,
    interactions: Vec<InteractionHistoryEntry>,
    comments: BTreeMap<String, InstagramComment>,
    conversations: BTreeMap<String, DirectConversation>,
}

/// Record store kept entirely in memory
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    observed: bool,
    fallback_reads: AtomicU64,
    metrics: MetricsCollector,
}

impl InMemoryStore {
    /// Empty store, reads are not observed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store whose reads are counted as fallback substitutions
    #[must_use]
    pub fn observed() -> Self {
        Self {
            observed: true,
            ..Self::default()
        }
    }

    /// Replace the store content with a dataset
    pub async fn load(&self, dataset: FallbackDataset) {
        let mut tables = self.tables.write().await;
        *tables = Tables {
            units: dataset.units.into_iter().map(|r| (r.id.clone(), r)).collect(),
            phases: dataset.phases.into_iter().map(|r| (r.id.clone(), r)).collect(),
            behavior_groups: dataset.behavior_groups.into_iter().map(|r| (r.id.clone(), r)).collect(),
            documentation: dataset.documentation.into_iter().map(|r| (r.id.clone(), r)).collect(),
            documentation_links: dataset
                .documentation_links
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            interactions: dataset.interactions,
            comments: dataset.comments.into_iter().map(|r| (r.id.clone(), r)).collect(),
            conversations: dataset.conversations.into_iter().map(|r| (r.id.clone(), r)).collect(),
        };
    }

    /// Number of reads served as fallback data
    pub fn fallback_reads(&self) -> u64 {
        self.fallback_reads.load(Ordering::Relaxed)
    }

    /// Number of interaction entries stored, across all units
    pub async fn interaction_count(&self) -> usize {
        self.tables.read().await.interactions.len()
    }

    fn observe(&self, collection: &'static str) {
        if self.observed {
            self.fallback_reads.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_fallback_read(collection);
            debug!(collection, "Served read from fallback data");
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_unit(&self, id: &str) -> Result<Option<Unit>> {
        self.observe(collections::UNITS);
        Ok(self.tables.read().await.units.get(id).cloned())
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        self.observe(collections::UNITS);
        let mut units: Vec<Unit> = self.tables.read().await.units.values().cloned().collect();
        units.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(units)
    }

    async fn save_unit(&self, unit: &Unit) -> Result<()> {
        self.tables.write().await.units.insert(unit.id.clone(), unit.clone());
        Ok(())
    }

    async fn get_phase(&self, id: &str) -> Result<Option<Phase>> {
        self.observe(collections::PHASES);
        Ok(self.tables.read().await.phases.get(id).cloned())
    }

    async fn list_phases(&self) -> Result<Vec<Phase>> {
        self.observe(collections::PHASES);
        let mut phases: Vec<Phase> = self.tables.read().await.phases.values().cloned().collect();
        crate::phases::sort_by_progression(&mut phases);
        Ok(phases)
    }

    async fn save_phase(&self, phase: &Phase) -> Result<()> {
        self.tables.write().await.phases.insert(phase.id.clone(), phase.clone());
        Ok(())
    }

    async fn behavior_groups_for_phase(&self, phase_id: &str) -> Result<Vec<BehaviorGroup>> {
        self.observe(collections::BEHAVIOR_GROUPS);
        let tables = self.tables.read().await;
        Ok(tables
            .behavior_groups
            .values()
            .filter(|g| g.phase_id == phase_id)
            .cloned()
            .collect())
    }

    async fn save_behavior_group(&self, group: &BehaviorGroup) -> Result<()> {
        self.tables
            .write()
            .await
            .behavior_groups
            .insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn documentation_for_phase(&self, phase_id: &str) -> Result<Vec<Documentation>> {
        self.observe(collections::DOCUMENTATION);
        let tables = self.tables.read().await;
        let mut linked: Vec<(i32, &Documentation)> = tables
            .documentation_links
            .values()
            .filter(|link| link.phase_id == phase_id)
            .filter_map(|link| {
                tables
                    .documentation
                    .get(&link.documentation_id)
                    .map(|doc| (link.priority, doc))
            })
            .collect();
        linked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(linked.into_iter().map(|(_, doc)| doc.clone()).collect())
    }

    async fn documentation_links_for_phase(&self, phase_id: &str) -> Result<Vec<DocumentationPhaseLink>> {
        self.observe(collections::DOCUMENTATION_LINKS);
        let tables = self.tables.read().await;
        let mut links: Vec<DocumentationPhaseLink> = tables
            .documentation_links
            .values()
            .filter(|link| link.phase_id == phase_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn save_documentation(&self, documentation: &Documentation) -> Result<()> {
        self.tables
            .write()
            .await
            .documentation
            .insert(documentation.id.clone(), documentation.clone());
        Ok(())
    }

    async fn save_documentation_link(&self, link: &DocumentationPhaseLink) -> Result<()> {
        self.tables
            .write()
            .await
            .documentation_links
            .insert(link.id.clone(), link.clone());
        Ok(())
    }

    async fn recent_interactions(&self, unit_id: &str, limit: usize) -> Result<Vec<InteractionHistoryEntry>> {
        self.observe(collections::INTERACTIONS);
        let tables = self.tables.read().await;
        // Reverse insertion order first so the stable sort keeps later appends ahead on ties
        let mut entries: Vec<InteractionHistoryEntry> = tables
            .interactions
            .iter()
            .rev()
            .filter(|entry| entry.unit_id == unit_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn append_interaction(&self, interaction: NewInteraction) -> Result<InteractionHistoryEntry> {
        let entry = interaction.into_entry();
        self.tables.write().await.interactions.push(entry.clone());
        Ok(entry)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<InstagramComment>> {
        self.observe(collections::COMMENTS);
        Ok(self.tables.read().await.comments.get(id).cloned())
    }

    async fn comments_for_unit(&self, unit_id: &str) -> Result<Vec<InstagramComment>> {
        self.observe(collections::COMMENTS);
        let tables = self.tables.read().await;
        let mut comments: Vec<InstagramComment> = tables
            .comments
            .values()
            .filter(|c| c.unit_id == unit_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.commented_at.cmp(&a.commented_at));
        Ok(comments)
    }

    async fn save_comment(&self, comment: &InstagramComment) -> Result<()> {
        self.tables
            .write()
            .await
            .comments
            .insert(comment.id.clone(), comment.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<DirectConversation>> {
        self.observe(collections::CONVERSATIONS);
        Ok(self.tables.read().await.conversations.get(id).cloned())
    }

    async fn conversations_for_unit(&self, unit_id: &str) -> Result<Vec<DirectConversation>> {
        self.observe(collections::CONVERSATIONS);
        let tables = self.tables.read().await;
        let mut conversations: Vec<DirectConversation> = tables
            .conversations
            .values()
            .filter(|c| c.unit_id == unit_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn save_conversation(&self, conversation: &DirectConversation) -> Result<()> {
        self.tables
            .write()
            .await
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }
}
