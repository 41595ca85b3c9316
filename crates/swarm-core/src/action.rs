//! Agent action vocabulary
//!
//! Actions are a closed sum type; each variant carries its own payload.
//! Bridge-specific behavior hangs extra meaning on `Collaborate` /
//! `TradePropose` metadata rather than growing new variants.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::ids::{AgentId, InteractionId, PostId, TaskId};

/// Behavioral class of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Honest,
    Opportunistic,
    Deceptive,
    Adversarial,
    External,
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Archetype::Honest => "honest",
            Archetype::Opportunistic => "opportunistic",
            Archetype::Deceptive => "deceptive",
            Archetype::Adversarial => "adversarial",
            Archetype::External => "external",
        };
        write!(f, "{s}")
    }
}

/// Direction of a feed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

/// An action emitted by an agent for one scheduler visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Post { content: String },
    Reply { post: PostId, content: String },
    Vote { post: PostId, direction: VoteDirection },
    ClaimTask { task: TaskId },
    SubmitWork { task: TaskId, quality: f64 },
    Verify { task: TaskId, approve: bool },
    Collaborate { partner: AgentId },
    TradePropose { partner: AgentId, transfer: f64 },
    TradeAccept { interaction: InteractionId },
    Pass,
}

impl Action {
    /// Stable tag used in event payloads and rate-limit bookkeeping.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Post { .. } => "post",
            Action::Reply { .. } => "reply",
            Action::Vote { .. } => "vote",
            Action::ClaimTask { .. } => "claim_task",
            Action::SubmitWork { .. } => "submit_work",
            Action::Verify { .. } => "verify",
            Action::Collaborate { .. } => "collaborate",
            Action::TradePropose { .. } => "trade_propose",
            Action::TradeAccept { .. } => "trade_accept",
            Action::Pass => "pass",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Action::Pass)
    }
}

/// What happened to an action once the orchestrator executed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// State changed as requested; no interaction was involved.
    Applied,
    /// The action opened or advanced an interaction.
    Interaction {
        id: InteractionId,
        partner: AgentId,
        accepted: bool,
        p: f64,
        payoff: f64,
    },
    /// The action was refused with a typed reason and converted to a pass.
    Refused { reason: ActionError },
}

/// Fed back to the emitting agent after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub tag: String,
    pub outcome: ActionOutcome,
}

impl ActionResult {
    pub fn applied(action: &Action) -> Self {
        Self {
            tag: action.tag().to_string(),
            outcome: ActionOutcome::Applied,
        }
    }

    pub fn refused(action: &Action, reason: ActionError) -> Self {
        Self {
            tag: action.tag().to_string(),
            outcome: ActionOutcome::Refused { reason },
        }
    }

    pub fn was_refused(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Refused { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tags_are_stable() {
        let a = Action::TradePropose {
            partner: AgentId::from("b"),
            transfer: 1.0,
        };
        assert_eq!(a.tag(), "trade_propose");
        assert_eq!(Action::Pass.tag(), "pass");
        assert!(Action::Pass.is_pass());
    }

    #[test]
    fn action_serializes_with_type_tag() {
        let a = Action::Vote {
            post: PostId::from_counter(3),
            direction: VoteDirection::Up,
        };
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"type\":\"vote\""));
        assert!(json.contains("\"direction\":\"up\""));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
