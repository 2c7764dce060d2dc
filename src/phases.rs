//! Phase reference data: display names, prompt instructions and progression.
//!
//! Everything here is static and performs no I/O.

use crate::error::{EngagementError, Result};
use crate::models::{Phase, PhaseName};

/// Instruction used for phase names missing from the instruction table
pub const PHASE_NOT_RECOGNIZED: &str = "Fase não reconhecida";

impl PhaseName {
    /// Human-readable name shown on the dashboard
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Interaction => "Interação",
            Self::PrePurchase => "Pré-Compras",
            Self::Purchase => "Compras",
            Self::PreLaunchWeek1 => "Pré-Inauguração - Semana 1",
            Self::PreLaunchWeek2 => "Pré-Inauguração - Semana 2",
            Self::Launch => "Inauguração",
            Self::Operation => "Operação",
            Self::TemporarilyClosed => "Loja Fechada Temporariamente",
            Self::PermanentlyClosed => "Loja Fechada Definitivamente",
        }
    }

    /// Instruction line embedded in answer prompts for this phase
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Interaction => {
                "Você está na fase de interação inicial. Seja acolhedor, colete informações básicas e não revele preços."
            }
            Self::PrePurchase => {
                "Você está na fase pré-compras. Pode mostrar produtos e preços, mas não finalize vendas."
            }
            Self::Purchase => {
                "Você está na fase de compras. Ajude com produtos, disponibilidade e formas de compra."
            }
            Self::PreLaunchWeek1 => {
                "A loja está na primeira semana de pré-inauguração. Gere expectativa e divulgue a data de abertura."
            }
            Self::PreLaunchWeek2 => {
                "A loja está na segunda semana de pré-inauguração. Reforce a data de abertura e as novidades."
            }
            Self::Launch => {
                "A loja está em inauguração. Celebre com a comunidade e informe horários e promoções de abertura."
            }
            Self::Operation => {
                "A loja está em operação regular. Atenda dúvidas sobre produtos, horários e serviços."
            }
            Self::TemporarilyClosed => {
                "A loja está fechada temporariamente. Informe o fechamento com cordialidade e não assuma compromissos de reabertura."
            }
            Self::PermanentlyClosed => {
                "A loja está fechada definitivamente. Informe o encerramento e indique outras unidades quando possível."
            }
        }
    }

    /// Phase that follows this one, if any
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let position = Self::ALL.iter().position(|p| *p == self)?;
        Self::ALL.get(position + 1).copied()
    }
}

/// Display name for a raw phase name; unknown names are shown as themselves
#[must_use]
pub fn display_name(phase_name: &str) -> &str {
    phase_name
        .parse::<PhaseName>()
        .map_or(phase_name, |phase| phase.display_name())
}

/// Instruction line for a raw phase name, never empty
#[must_use]
pub fn instruction_for(phase_name: &str) -> &'static str {
    phase_name
        .parse::<PhaseName>()
        .map_or(PHASE_NOT_RECOGNIZED, PhaseName::instruction)
}

/// Sort phases by their progression order, ties broken by id
pub fn sort_by_progression(phases: &mut [Phase]) {
    phases.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// Check whether a unit may move from its current phase to `to`
pub fn validate_transition(from: Option<&Phase>, to: &Phase) -> Result<()> {
    if to.id.trim().is_empty() {
        return Err(EngagementError::validation("target phase id cannot be empty"));
    }

    if !to.active {
        return Err(EngagementError::validation(format!(
            "phase {} is not active",
            display_name(&to.name)
        )));
    }

    if from.is_some_and(|current| current.id == to.id) {
        return Err(EngagementError::validation(
            "cannot transition to the same phase",
        ));
    }

    Ok(())
}
