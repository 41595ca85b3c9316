//! Per-agent ledger entry

use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, Archetype};

/// Kernel-owned mutable state for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub archetype: Archetype,
    pub reputation: f64,
    pub resources: f64,
    pub stake: f64,
    /// First epoch at which the agent may act again, if frozen.
    pub frozen_until: Option<u64>,
    /// Quarantined agents observe but never act for the rest of the run.
    pub quarantined: bool,
    /// Total interactions this agent has participated in.
    pub interactions_seen: u64,
    /// Total payoff accumulated over the run.
    pub total_payoff: f64,
}

impl AgentState {
    pub fn new(
        id: AgentId,
        archetype: Archetype,
        reputation: f64,
        resources: f64,
        stake: f64,
    ) -> Self {
        Self {
            id,
            archetype,
            reputation,
            resources,
            stake,
            frozen_until: None,
            quarantined: false,
            interactions_seen: 0,
            total_payoff: 0.0,
        }
    }

    /// Whether the agent is frozen at the given epoch.
    pub fn is_frozen(&self, epoch: u64) -> bool {
        self.frozen_until.is_some_and(|until| epoch < until)
    }

    /// Whether the agent may be scheduled at all at the given epoch.
    pub fn can_act(&self, epoch: u64) -> bool {
        !self.quarantined && !self.is_frozen(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentState {
        AgentState::new(AgentId::from("a"), Archetype::Honest, 0.5, 10.0, 0.0)
    }

    #[test]
    fn fresh_agent_can_act() {
        assert!(agent().can_act(0));
    }

    #[test]
    fn freeze_window_is_half_open() {
        let mut a = agent();
        a.frozen_until = Some(5);
        assert!(a.is_frozen(4));
        assert!(!a.is_frozen(5));
        assert!(!a.can_act(3));
        assert!(a.can_act(5));
    }

    #[test]
    fn quarantine_is_permanent() {
        let mut a = agent();
        a.quarantined = true;
        assert!(!a.can_act(0));
        assert!(!a.can_act(1_000));
    }
}
