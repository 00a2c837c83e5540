//! Conversation log records and per-cycle results.

use crate::level::UnderstandingLevel;
use crate::scaffolding::ScaffoldingType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chat cycle as persisted in the conversation log.
///
/// Created once per cycle. The only supported mutation is the per-learner
/// redaction of `message` and `reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique record ID
    pub id: String,

    /// Learner identifier
    pub learner: String,

    /// What the learner wrote
    pub message: String,

    /// What the tutor replied
    pub reply: String,

    /// Resolved unit key (a taxonomy unit name or "general concept")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaffolding: Option<ScaffoldingType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<UnderstandingLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// When the cycle completed
    pub timestamp: DateTime<Utc>,
}

impl ConversationRecord {
    /// Build a record for a completed chat cycle, stamped now.
    pub fn from_outcome(learner: impl Into<String>, message: impl Into<String>, outcome: &ChatOutcome) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            learner: learner.into(),
            message: message.into(),
            reply: outcome.reply.clone(),
            unit: Some(outcome.learning_unit.clone()),
            scaffolding: Some(outcome.scaffolding_type),
            level: Some(outcome.understanding_level),
            rationale: Some(outcome.rationale.clone()),
            timestamp: Utc::now(),
        }
    }

    /// Whether message and reply have both been blanked by redaction.
    pub fn is_redacted(&self) -> bool {
        self.message.is_empty() && self.reply.is_empty()
    }
}

/// The classifier's decision for one message. Not persisted on its own; it
/// is folded into the next [`ConversationRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub unit: String,
    pub scaffolding: ScaffoldingType,
    pub level: UnderstandingLevel,
    pub rationale: String,
    /// True when the deterministic fallback was used.
    #[serde(default)]
    pub degraded: bool,
}

/// The per-cycle output payload handed to the routing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub learning_unit: String,
    pub scaffolding_type: ScaffoldingType,
    pub understanding_level: UnderstandingLevel,
    pub rationale: String,
}
