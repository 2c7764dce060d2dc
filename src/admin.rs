//! Administrative writes: units, phase progression, behavior groups and
//! documentation scoping.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::{EngagementError, Result};
use crate::models::{
    new_id, BehaviorGroup, BehaviorScope, Documentation, DocumentationKind, DocumentationPhaseLink, Unit,
    UnitStatus,
};
use crate::phases;
use crate::store::{collections, RecordStore};
use crate::validation::InputValidator;

/// Fields of a behavior group as entered by staff
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorGroupInput {
    /// Phase the group belongs to
    pub phase_id: String,
    /// Staff-facing description
    pub description: String,
    /// Whether the model may answer on its own
    pub may_respond: bool,
    /// Reply used when the model may not answer
    pub default_reply: Option<String>,
    /// Untyped scope object; validated against the restriction vocabulary
    pub scope: serde_json::Value,
}

/// Staff writes to units, behavior groups and documentation
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn RecordStore>,
}

impl AdminService {
    /// Create a service over a record store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Register a unit in planning status with no phase yet
    pub async fn create_unit(&self, name: &str, code: &str, location: &str) -> Result<Unit> {
        InputValidator::validate_title(name)?;
        InputValidator::validate_id("unit code", code)?;

        let now = Utc::now();
        let unit = Unit {
            id: new_id(),
            name: InputValidator::sanitize_text(name),
            code: code.trim().to_string(),
            location: InputValidator::sanitize_text(location),
            current_phase_id: None,
            status: UnitStatus::Planning,
            created_at: now,
            updated_at: now,
        };
        self.store.save_unit(&unit).await?;
        info!(unit_id = %unit.id, code = %unit.code, "Unit created");
        Ok(unit)
    }

    /// Move a unit to another phase.
    ///
    /// The target must exist, be active and differ from the current phase. A
    /// current phase reference that no longer resolves does not block the move.
    pub async fn advance_unit_phase(&self, unit_id: &str, phase_id: &str) -> Result<Unit> {
        InputValidator::validate_unit_id(unit_id)?;
        InputValidator::validate_id("phase", phase_id)?;

        let mut unit = self
            .store
            .get_unit(unit_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(collections::UNITS, unit_id))?;
        let target = self
            .store
            .get_phase(phase_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(collections::PHASES, phase_id))?;
        let current = match unit.phase_ref() {
            Some(current_id) => self.store.get_phase(current_id).await?,
            None => None,
        };

        phases::validate_transition(current.as_ref(), &target)?;

        unit.current_phase_id = Some(target.id.clone());
        unit.updated_at = Utc::now();
        self.store.save_unit(&unit).await?;

        info!(
            unit_id,
            from = current.as_ref().map_or("none", |p| p.name.as_str()),
            to = %target.name,
            "Unit phase advanced"
        );
        Ok(unit)
    }

    /// Create a behavior group for a phase
    pub async fn save_behavior_group(&self, input: BehaviorGroupInput) -> Result<BehaviorGroup> {
        InputValidator::validate_id("phase", &input.phase_id)?;
        if input.description.trim().is_empty() {
            return Err(EngagementError::validation("behavior group description cannot be empty"));
        }
        let scope = BehaviorScope::from_value(input.scope)?;
        if self.store.get_phase(&input.phase_id).await?.is_none() {
            return Err(EngagementError::not_found(collections::PHASES, input.phase_id));
        }

        let now = Utc::now();
        let group = BehaviorGroup {
            id: new_id(),
            phase_id: input.phase_id,
            description: InputValidator::sanitize_text(&input.description),
            may_respond: input.may_respond,
            active: true,
            default_reply: input
                .default_reply
                .map(|reply| InputValidator::sanitize_text(&reply))
                .filter(|reply| !reply.is_empty()),
            scope,
            created_at: now,
            updated_at: now,
        };
        self.store.save_behavior_group(&group).await?;
        Ok(group)
    }

    /// Create an active documentation item
    pub async fn create_documentation(
        &self,
        title: &str,
        content: &str,
        kind: DocumentationKind,
    ) -> Result<Documentation> {
        InputValidator::validate_title(title)?;
        if content.trim().is_empty() {
            return Err(EngagementError::validation("documentation content cannot be empty"));
        }

        let now = Utc::now();
        let documentation = Documentation {
            id: new_id(),
            title: InputValidator::sanitize_text(title),
            content: content.to_string(),
            kind,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.save_documentation(&documentation).await?;
        Ok(documentation)
    }

    /// Link documentation to phases.
    ///
    /// Existing links are kept; new links take priorities after the highest
    /// existing priority of each phase, in the order given.
    pub async fn scope_documentation(
        &self,
        documentation_id: &str,
        phase_ids: &[String],
    ) -> Result<Vec<DocumentationPhaseLink>> {
        InputValidator::validate_id("documentation", documentation_id)?;
        let known = self.store.list_phases().await?;

        let mut created = Vec::with_capacity(phase_ids.len());
        for phase_id in phase_ids {
            if !known.iter().any(|phase| &phase.id == phase_id) {
                return Err(EngagementError::not_found(collections::PHASES, phase_id.clone()));
            }
            let existing = self.store.documentation_links_for_phase(phase_id).await?;
            if existing.iter().any(|link| link.documentation_id == documentation_id) {
                continue;
            }

            let link = DocumentationPhaseLink {
                id: new_id(),
                phase_id: phase_id.clone(),
                documentation_id: documentation_id.to_string(),
                priority: existing.iter().map(|link| link.priority).max().unwrap_or(0) + 1,
                created_at: Utc::now(),
            };
            self.store.save_documentation_link(&link).await?;
            created.push(link);
        }

        info!(documentation_id, links = created.len(), "Documentation scoped");
        Ok(created)
    }

    /// Documentation ids linked to a phase, by priority
    pub async fn phase_documentation_ids(&self, phase_id: &str) -> Result<Vec<String>> {
        InputValidator::validate_id("phase", phase_id)?;
        Ok(self
            .store
            .documentation_links_for_phase(phase_id)
            .await?
            .into_iter()
            .map(|link| link.documentation_id)
            .collect())
    }
}
