//! Data models for units, phases, behavior rules and engagement records
//!
//! This module contains the records kept in the record store (units, phases,
//! behavior groups, documentation, interaction history, Instagram comments and
//! Direct conversations) and the value types that flow through the AI pipeline.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, Result};

/// Timestamp type used by every record
pub type Timestamp = DateTime<Utc>;

/// Phase name used when a unit has no resolvable current phase
pub const UNKNOWN_PHASE: &str = "unknown";

/// Generate a fresh record id
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Value as stored in the record store
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = EngagementError;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $($wire $(| $alias)* => Ok(Self::$variant),)+
                    other => Err(EngagementError::validation(format!(
                        "invalid {}: {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Operational status of a unit
    UnitStatus {
        /// Unit is operating
        Active => "ativa",
        /// Unit is switched off
        Inactive => "inativa",
        /// Unit is being planned
        Planning => "planejamento",
        /// Unit is being implemented
        Implementing => "implementacao",
        /// Unit is moving between phases
        Transitioning => "transicao",
        /// Unit is in an error state
        Error => "erro",
    }
}

wire_enum! {
    /// The nine named operational stages, in progression order
    PhaseName {
        /// First contact with the community
        Interaction => "interacao",
        /// Products can be shown, sales cannot be closed
        PrePurchase => "pre_compras",
        /// Purchasing is open
        Purchase => "compras",
        /// First week before the store opens
        PreLaunchWeek1 => "pre_inauguracao_semana_1",
        /// Second week before the store opens
        PreLaunchWeek2 => "pre_inauguracao_semana_2",
        /// Store opening
        Launch => "inauguracao",
        /// Regular operation
        Operation => "operacao",
        /// Store closed for a while
        TemporarilyClosed => "loja_fechada_temporariamente",
        /// Store closed for good
        PermanentlyClosed => "loja_fechada_definitivamente",
    }
}

wire_enum! {
    /// Closed vocabulary of behavior restrictions
    RestrictionTag {
        /// Do not disclose prices
        NoPriceDisclosure => "nao-revelar-precos",
        /// Do not make promises or guarantees
        NoPromises => "nao-fazer-promessas",
        /// Do not close sales or process payments
        NoSalesClosing => "nao-finalizar-vendas",
        /// Do not give technical support
        NoTechnicalSupport => "nao-dar-suporte-tecnico",
        /// Do not take complaints, redirect them to customer service
        NoComplaints => "nao-aceitar-reclamacoes",
    }
}

wire_enum! {
    /// General or phase-specific documentation
    DocumentationKind {
        /// General documentation; still reaches prompts only through phase links
        Standard => "padrao",
        /// Applies to the phases it is linked to
        PerPhase => "por_fase",
    }
}

wire_enum! {
    /// Moderation outcome of an Instagram comment
    Classification {
        /// Positive, neutral or valuable comment
        Approved => "approved" | "aprovado",
        /// Negative, spam, offensive or inappropriate comment
        Rejected => "rejected" | "reprovado",
        /// Needs human review
        Pending => "pending" | "pendente",
    }
}

wire_enum! {
    /// Which side sent a Direct message
    Sender {
        /// The unit's account
        Me => "me",
        /// The Instagram user
        Them => "them",
    }
}

wire_enum! {
    /// Lifecycle status of a Direct conversation
    ConversationStatus {
        /// Open conversation
        Active => "ativa",
        /// Archived by staff
        Archived => "arquivada",
        /// Blocked by staff
        Blocked => "bloqueada",
    }
}

impl Classification {
    /// Parse a label produced by the language model.
    ///
    /// Only the three English labels are accepted here; the Portuguese store
    /// aliases are not valid model output.
    pub fn from_model_label(label: &str) -> Result<Self> {
        match label {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "pending" => Ok(Self::Pending),
            other => Err(EngagementError::malformed(format!(
                "classification must be approved, rejected or pending, got {other:?}"
            ))),
        }
    }
}

impl RestrictionTag {
    /// Short label shown to staff
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoPriceDisclosure => "Não revelar preços",
            Self::NoPromises => "Não fazer promessas",
            Self::NoSalesClosing => "Não finalizar vendas",
            Self::NoTechnicalSupport => "Não dar suporte técnico",
            Self::NoComplaints => "Não aceitar reclamações",
        }
    }

    /// One-line description shown next to the label
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NoPriceDisclosure => "Não informar valores",
            Self::NoPromises => "Evitar garantias",
            Self::NoSalesClosing => "Não processar pagamentos",
            Self::NoTechnicalSupport => "Evitar questões técnicas",
            Self::NoComplaints => "Direcionar para SAC",
        }
    }
}

/// A retail unit going through operational phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Record id
    pub id: String,
    /// Display name
    pub name: String,
    /// Short business code
    pub code: String,
    /// Free-text location
    pub location: String,
    /// Weak reference to the current phase
    pub current_phase_id: Option<String>,
    /// Operational status
    pub status: UnitStatus,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

impl Unit {
    /// Current phase id, treating blank references as absent
    #[must_use]
    pub fn phase_ref(&self) -> Option<&str> {
        self.current_phase_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Read-only phase reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Record id
    pub id: String,
    /// Raw phase name; normally one of [`PhaseName`]
    pub name: String,
    /// Progression order
    pub order: i32,
    /// Color tag used by the dashboard
    pub color: String,
    /// Whether the phase can currently be entered
    pub active: bool,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

impl Phase {
    /// Typed phase name, when the raw name is one of the nine known stages
    #[must_use]
    pub fn kind(&self) -> Option<PhaseName> {
        self.name.parse().ok()
    }
}

/// Typed behavior scope of a behavior group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorScope {
    /// Restrictions rendered into prompts
    #[serde(default, rename = "restricoes", alias = "restrictions")]
    pub restrictions: BTreeSet<RestrictionTag>,
    /// Questions the assistant may answer in this phase
    #[serde(default, rename = "perguntas_permitidas", alias = "allowed_questions")]
    pub allowed_questions: Vec<String>,
}

impl BehaviorScope {
    /// Validate an untyped scope object, rejecting unknown restriction tags
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| EngagementError::validation(format!("invalid behavior scope: {e}")))
    }
}

/// Per-phase AI behavior rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorGroup {
    /// Record id
    pub id: String,
    /// Owning phase
    pub phase_id: String,
    /// Description of the expected behavior
    pub description: String,
    /// Whether the assistant may answer at all
    pub may_respond: bool,
    /// Whether this group is in use
    pub active: bool,
    /// Fallback reply text
    pub default_reply: Option<String>,
    /// Restrictions and allowed questions
    pub scope: BehaviorScope,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

/// A titled documentation item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    /// Record id
    pub id: String,
    /// Title
    pub title: String,
    /// Rich text content
    pub content: String,
    /// Scoping kind
    pub kind: DocumentationKind,
    /// Whether the item is used for retrieval
    pub active: bool,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

/// Join record scoping documentation to a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationPhaseLink {
    /// Record id
    pub id: String,
    /// Linked phase
    pub phase_id: String,
    /// Linked documentation
    pub documentation_id: String,
    /// Lower values come first
    pub priority: i32,
    /// Creation timestamp
    pub created_at: Timestamp,
}

/// Append-only audit record of one AI interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionHistoryEntry {
    /// Record id
    pub id: String,
    /// Unit the interaction belongs to
    pub unit_id: String,
    /// Who asked
    pub user_id: String,
    /// Query text
    pub query: String,
    /// Response text (empty for failures)
    pub response: String,
    /// Phase at the time of the interaction
    pub phase_id: Option<String>,
    /// Whether the model produced a valid answer
    pub success: bool,
    /// Response latency in milliseconds
    pub latency_ms: u64,
    /// Model confidence
    pub confidence: f64,
    /// Sources cited by the model
    pub sources: Vec<String>,
    /// Creation timestamp
    pub created_at: Timestamp,
}

/// Data for appending an interaction history entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    /// Unit the interaction belongs to
    pub unit_id: String,
    /// Who asked
    pub user_id: String,
    /// Query text
    pub query: String,
    /// Response text
    pub response: String,
    /// Phase at the time of the interaction
    pub phase_id: Option<String>,
    /// Whether the model produced a valid answer
    pub success: bool,
    /// Response latency in milliseconds
    pub latency_ms: u64,
    /// Model confidence
    pub confidence: f64,
    /// Sources cited by the model
    pub sources: Vec<String>,
}

impl NewInteraction {
    /// Turn into a stored entry with a fresh id and timestamp
    #[must_use]
    pub fn into_entry(self) -> InteractionHistoryEntry {
        InteractionHistoryEntry {
            id: new_id(),
            unit_id: self.unit_id,
            user_id: self.user_id,
            query: self.query,
            response: self.response,
            phase_id: self.phase_id,
            success: self.success,
            latency_ms: self.latency_ms,
            confidence: self.confidence,
            sources: self.sources,
            created_at: Utc::now(),
        }
    }
}

/// An Instagram comment awaiting or carrying a moderation decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstagramComment {
    /// Record id
    pub id: String,
    /// Owning unit
    pub unit_id: String,
    /// Comment text
    pub content: String,
    /// Instagram author handle
    pub author: String,
    /// When the comment was posted
    pub commented_at: Timestamp,
    /// Moderation outcome, unset until moderated
    pub classification: Option<Classification>,
    /// Confidence of the decision
    pub confidence: Option<f64>,
    /// Why the decision was made
    pub justification: Option<String>,
    /// Reply suggested by the assistant
    pub suggested_response: Option<String>,
    /// Whether the unit should reply
    pub should_respond: Option<bool>,
    /// Whether the comment should be removed
    pub should_delete: Option<bool>,
    /// When the decision was applied
    pub processed_at: Option<Timestamp>,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Option<Timestamp>,
}

impl InstagramComment {
    /// Build a freshly ingested, unmoderated comment
    #[must_use]
    pub fn ingested(unit_id: &str, author: &str, content: &str, commented_at: Timestamp) -> Self {
        Self {
            id: new_id(),
            unit_id: unit_id.to_string(),
            content: content.to_string(),
            author: author.to_string(),
            commented_at,
            classification: None,
            confidence: None,
            justification: None,
            suggested_response: None,
            should_respond: None,
            should_delete: None,
            processed_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Approved and rejected comments cannot be moderated again
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.classification,
            Some(Classification::Approved | Classification::Rejected)
        )
    }
}

/// One message in a Direct conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    /// Message id, unique within the conversation
    pub id: String,
    /// Sending side
    pub sender: Sender,
    /// Message text
    pub text: String,
    /// When the message was sent
    pub timestamp: Timestamp,
}

/// A reply suggestion attached to a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySuggestion {
    /// Suggestion key
    pub id: String,
    /// Suggested text
    #[serde(rename = "texto")]
    pub text: String,
}

/// An Instagram Direct conversation owned by a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectConversation {
    /// Record id
    pub id: String,
    /// Owning unit
    pub unit_id: String,
    /// Instagram user id of the other side
    pub external_user_id: String,
    /// Display name of the other side
    pub display_name: Option<String>,
    /// Messages, oldest first
    pub messages: Vec<DirectMessage>,
    /// Inbound messages not yet read by staff
    pub unread_count: u32,
    /// Number of messages in the conversation
    pub total_count: u32,
    /// Lifecycle status
    pub status: ConversationStatus,
    /// Free-form metadata
    pub metadata: serde_json::Value,
    /// Raw AI reply suggestions as stored
    pub ai_suggestions: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Last update timestamp
    pub updated_at: Timestamp,
}

/// Immutable snapshot of what the model needs to answer for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct AiContext {
    /// Unit the context was assembled for
    pub unit_id: String,
    /// Resolved phase id, if the unit has one
    pub phase_id: Option<String>,
    /// Resolved phase name, or [`UNKNOWN_PHASE`]
    pub phase_name: String,
    /// Content of the phase-scoped documentation
    pub documentation: Vec<String>,
    /// Recent interactions, newest first
    pub recent_interactions: Vec<InteractionHistoryEntry>,
    /// Behavior rules of the phase
    pub behavior_group: Option<BehaviorGroup>,
}

/// Free-form answer produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    /// Answer text
    pub content: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Sources the answer is based on
    pub sources: Vec<String>,
    /// Follow-up actions for staff
    pub suggested_actions: Vec<String>,
}

/// Advisory classification of an Instagram comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentClassification {
    /// Suggested outcome
    pub classification: Classification,
    /// Confidence of the suggestion
    pub confidence: f64,
    /// Why the model chose this outcome
    pub justification: String,
    /// Reply suggestion, if any
    pub suggested_response: Option<String>,
    /// Whether the unit should reply
    pub should_respond: bool,
    /// Whether the comment should be removed
    pub should_delete: bool,
}

/// Outcome of one AI test run, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTestResult {
    /// Unit under test
    pub unit_id: String,
    /// Phase of the unit when tested
    pub phase_id: Option<String>,
    /// Query text
    pub query: String,
    /// Answer text (empty on failure)
    pub response: String,
    /// Round-trip time in milliseconds
    pub response_time_ms: u64,
    /// Confidence reported by the model
    pub confidence: f64,
    /// Sources reported by the model
    pub sources: Vec<String>,
    /// Behavior group used to answer
    pub behavior_group_used: String,
    /// When the test ran
    pub timestamp: Timestamp,
    /// Whether the test produced an answer
    pub success: bool,
    /// Error text for failed runs
    pub error_message: Option<String>,
    /// Raw webhook body, for webhook runs
    pub webhook_data: Option<serde_json::Value>,
}
