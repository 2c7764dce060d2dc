//! Context assembly.
//!
//! Gathers everything the model needs to answer for one unit: the unit's
//! phase, that phase's behavior rules and documentation, and the unit's recent
//! interaction history. Missing optional relations degrade to a partial
//! context; only a missing unit is an error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{EngagementError, Result};
use crate::models::{AiContext, BehaviorGroup, Documentation, InteractionHistoryEntry, Phase, UNKNOWN_PHASE};
use crate::store::{collections, RecordStore};

/// Number of history entries pulled into a context
pub const RECENT_INTERACTION_LIMIT: usize = 10;

/// Builds [`AiContext`] snapshots from the record store
#[derive(Clone)]
pub struct ContextAssembler {
    store: Arc<dyn RecordStore>,
}

impl ContextAssembler {
    /// Create an assembler reading from `store`
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Assemble the context for a unit.
    ///
    /// The phase, its behavior groups, its documentation and the unit history
    /// are independent reads and are issued concurrently once the unit is
    /// known.
    pub async fn assemble(&self, unit_id: &str) -> Result<AiContext> {
        let unit = self
            .store
            .get_unit(unit_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(collections::UNITS, unit_id))?;

        let (phase, groups, documentation, recent_interactions) = match unit.phase_ref() {
            Some(phase_id) => {
                tokio::try_join!(
                    self.store.get_phase(phase_id),
                    self.store.behavior_groups_for_phase(phase_id),
                    self.store.documentation_for_phase(phase_id),
                    self.store.recent_interactions(&unit.id, RECENT_INTERACTION_LIMIT),
                )?
            }
            None => (
                None,
                Vec::new(),
                Vec::new(),
                self.store
                    .recent_interactions(&unit.id, RECENT_INTERACTION_LIMIT)
                    .await?,
            ),
        };

        Ok(build_context(unit.id, phase, groups, documentation, recent_interactions))
    }

    /// [`assemble`](Self::assemble), aborted with [`EngagementError::Cancelled`]
    /// as soon as `cancel` fires
    pub async fn assemble_cancellable(&self, unit_id: &str, cancel: &CancellationToken) -> Result<AiContext> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngagementError::Cancelled),
            context = self.assemble(unit_id) => context,
        }
    }
}

fn build_context(
    unit_id: String,
    phase: Option<Phase>,
    groups: Vec<BehaviorGroup>,
    documentation: Vec<Documentation>,
    recent_interactions: Vec<InteractionHistoryEntry>,
) -> AiContext {
    // A dangling phase reference is treated like no phase at all
    let Some(phase) = phase else {
        return AiContext {
            unit_id,
            phase_id: None,
            phase_name: UNKNOWN_PHASE.to_string(),
            documentation: Vec::new(),
            recent_interactions,
            behavior_group: None,
        };
    };

    AiContext {
        unit_id,
        phase_id: Some(phase.id),
        phase_name: phase.name,
        documentation: documentation
            .into_iter()
            .filter(|doc| doc.active)
            .map(|doc| doc.content)
            .collect(),
        recent_interactions,
        behavior_group: select_behavior_group(groups),
    }
}

/// Pick the behavior group of a phase: the active group with the lowest id,
/// else the lowest id overall
#[must_use]
pub fn select_behavior_group(groups: Vec<BehaviorGroup>) -> Option<BehaviorGroup> {
    let (active, inactive): (Vec<_>, Vec<_>) = groups.into_iter().partition(|group| group.active);
    let candidates = if active.is_empty() { inactive } else { active };
    candidates.into_iter().min_by(|a, b| a.id.cmp(&b.id))
}
