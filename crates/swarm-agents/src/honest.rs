//! Honest archetype
//!
//! Cooperates by default, works tasks diligently, and keeps a per-partner
//! trust estimate blended from experienced outcomes. Acceptance shades the
//! proxy's label by that trust; at the neutral trust of 0.5 the rule is
//! exactly "accept when the estimated label clears 0.4".

use std::collections::BTreeMap;

use swarm_core::{
    Action, ActionOutcome, ActionResult, AgentId, Archetype, KernelRng, VoteDirection,
};

use crate::observation::{Observation, ProposalView};
use crate::policy::{AgentPolicy, WorkIntent};

const ACCEPT_THRESHOLD: f64 = 0.4;
const NEUTRAL_TRUST: f64 = 0.5;
/// Blend factor for trust updates: how much one outcome moves the estimate.
const TRUST_LEARNING: f64 = 0.3;

pub struct HonestPolicy {
    trust: BTreeMap<AgentId, f64>,
}

impl HonestPolicy {
    pub fn new() -> Self {
        Self {
            trust: BTreeMap::new(),
        }
    }

    fn trust_in(&self, id: &AgentId) -> f64 {
        self.trust.get(id).copied().unwrap_or(NEUTRAL_TRUST)
    }

    /// Preferred collaboration target: the most trusted peer, ties broken
    /// by id.
    fn preferred_peer<'a>(&self, obs: &'a Observation) -> Option<&'a AgentId> {
        obs.peers.iter().map(|p| &p.id).max_by(|a, b| {
            self.trust_in(a)
                .partial_cmp(&self.trust_in(b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.cmp(a))
        })
    }
}

impl Default for HonestPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentPolicy for HonestPolicy {
    fn archetype(&self) -> Archetype {
        Archetype::Honest
    }

    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action {
        // finish claimed work first
        if let Some(task) = &obs.this.claimed_task {
            return Action::SubmitWork {
                task: task.clone(),
                quality: rng.range_f64(0.8, 0.95),
            };
        }
        // verify someone else's submission
        if !obs.verifiable_tasks.is_empty() && rng.chance(0.5) {
            let task = &obs.verifiable_tasks[rng.index(obs.verifiable_tasks.len())];
            return Action::Verify {
                task: task.id.clone(),
                approve: true,
            };
        }
        // pick up open work
        if !obs.open_tasks.is_empty() && rng.chance(0.4) {
            let task = &obs.open_tasks[rng.index(obs.open_tasks.len())];
            return Action::ClaimTask {
                task: task.id.clone(),
            };
        }
        // collaborate, leaning toward partners that have worked out
        if !obs.peers.is_empty() && rng.chance(0.5) {
            let partner = if rng.chance(0.7) {
                self.preferred_peer(obs).cloned()
            } else {
                Some(obs.peers[rng.index(obs.peers.len())].id.clone())
            };
            if let Some(partner) = partner {
                return Action::Collaborate { partner };
            }
        }
        // upvote something from the feed
        if !obs.feed.is_empty() && rng.chance(0.3) {
            let post = &obs.feed[rng.index(obs.feed.len())];
            if post.author != obs.this.id {
                return Action::Vote {
                    post: post.id.clone(),
                    direction: VoteDirection::Up,
                };
            }
        }
        if rng.chance(0.3) {
            return Action::Post {
                content: "sharing progress notes".to_string(),
            };
        }
        Action::Pass
    }

    fn accept(&mut self, proposal: &ProposalView, _obs: &Observation, _rng: &mut KernelRng) -> bool {
        // neutral trust leaves the label untouched
        let estimate = proposal.estimated_p * (0.5 + self.trust_in(&proposal.initiator));
        estimate >= ACCEPT_THRESHOLD
    }

    fn work_intent(&mut self, _counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent {
        WorkIntent::honest(rng.range_f64(0.8, 0.95))
    }

    fn on_result(&mut self, result: &ActionResult) {
        if let ActionOutcome::Interaction {
            partner,
            accepted,
            p,
            ..
        } = &result.outcome
        {
            if *accepted {
                let entry = self.trust.entry(partner.clone()).or_insert(NEUTRAL_TRUST);
                *entry = ((1.0 - TRUST_LEARNING) * *entry + TRUST_LEARNING * p).clamp(0.0, 1.0);
            }
        }
    }
}
