//! What an agent sees when it is visited
//!
//! Observations are plain data snapshots assembled by the orchestrator.
//! Optional knowledge (a claimed task, a visible feed) is explicit; there
//! is no back-channel to live state.

use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, Archetype, InteractionId, InteractionKind, PostId, TaskId};

/// The observing agent's own ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfView {
    pub id: AgentId,
    pub archetype: Archetype,
    pub reputation: f64,
    pub resources: f64,
    pub stake: f64,
    /// Task this agent has claimed but not yet submitted.
    pub claimed_task: Option<TaskId>,
}

/// A peer the agent could interact with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: AgentId,
    /// Possibly noisy public reputation.
    pub reputation: f64,
}

/// A post on the visible feed slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub author: AgentId,
    pub score: f64,
}

/// A task the agent could claim or verify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub reward: f64,
    /// Author of the submission, when one is awaiting verification.
    pub submitted_by: Option<AgentId>,
}

/// One scheduler visit's worth of world knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub epoch: u64,
    pub step: u64,
    pub this: SelfView,
    /// Active peers, self excluded.
    pub peers: Vec<PeerInfo>,
    pub feed: Vec<PostView>,
    pub open_tasks: Vec<TaskView>,
    /// Tasks with someone else's submission awaiting verification.
    pub verifiable_tasks: Vec<TaskView>,
}

impl Observation {
    /// Peer with the highest public reputation, ties broken by id.
    pub fn most_reputable_peer(&self) -> Option<&PeerInfo> {
        self.peers.iter().max_by(|a, b| {
            a.reputation
                .partial_cmp(&b.reputation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.id.cmp(&a.id))
        })
    }

    pub fn peer_reputation(&self, id: &AgentId) -> Option<f64> {
        self.peers.iter().find(|p| &p.id == id).map(|p| p.reputation)
    }
}

/// An interaction proposal as seen by the counterparty deciding on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: InteractionId,
    pub initiator: AgentId,
    pub kind: InteractionKind,
    pub tau: f64,
    /// The proxy's soft label for the proposed interaction.
    pub estimated_p: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(peers: Vec<(&str, f64)>) -> Observation {
        Observation {
            epoch: 0,
            step: 0,
            this: SelfView {
                id: AgentId::from("me"),
                archetype: Archetype::Honest,
                reputation: 0.5,
                resources: 10.0,
                stake: 0.0,
                claimed_task: None,
            },
            peers: peers
                .into_iter()
                .map(|(id, reputation)| PeerInfo {
                    id: AgentId::from(id),
                    reputation,
                })
                .collect(),
            feed: vec![],
            open_tasks: vec![],
            verifiable_tasks: vec![],
        }
    }

    #[test]
    fn most_reputable_peer_picks_maximum() {
        let o = obs(vec![("a", 0.2), ("b", 0.9), ("c", 0.4)]);
        assert_eq!(o.most_reputable_peer().unwrap().id, AgentId::from("b"));
    }

    #[test]
    fn reputation_ties_break_by_id() {
        let o = obs(vec![("b", 0.5), ("a", 0.5)]);
        assert_eq!(o.most_reputable_peer().unwrap().id, AgentId::from("a"));
    }

    #[test]
    fn empty_peer_set_yields_none() {
        assert!(obs(vec![]).most_reputable_peer().is_none());
    }
}
