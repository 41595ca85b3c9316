//! Rulings: what governance decided, for the orchestrator to apply

use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, AuditVerdict};

/// Governance decision for one resolved interaction, in lever order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionRuling {
    /// Cost charged against the initiator's payoff.
    pub cost_a: f64,
    /// Cost charged against the counterparty's payoff.
    pub cost_b: f64,
    /// Tax recorded on the interaction record.
    pub taxed_amount: f64,
    pub audited: bool,
    pub audit_verdict: Option<AuditVerdict>,
    /// Reputation deltas to apply (agent, delta), in decision order.
    pub reputation_deltas: Vec<(AgentId, f64)>,
    /// Freeze the agent until the given epoch.
    pub freeze: Option<(AgentId, u64)>,
    /// Slash the agent's stake at the given rate.
    pub slash: Option<(AgentId, f64)>,
    /// Ordered pairs newly flagged for collusion.
    pub flagged_pairs: Vec<(AgentId, AgentId)>,
}

/// Epoch-start decision: agents whose cooldown expired.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochStartRuling {
    pub unfreeze: Vec<AgentId>,
}

/// Epoch-end decision: blended reputation per agent, in id order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpochEndRuling {
    pub reputation_updates: Vec<(AgentId, f64)>,
}
