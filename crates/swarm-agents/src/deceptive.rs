//! Deceptive archetype
//!
//! Plays honest long enough to build trust, then exploits the partners
//! that trusted it. The turn point `T` is drawn per instance from the
//! kernel RNG, uniform on {3..=8}, so a population of deceptives does not
//! defect in lockstep.

use std::collections::BTreeMap;

use swarm_core::{
    Action, ActionOutcome, ActionResult, AgentId, Archetype, KernelRng, VoteDirection,
};
use tracing::debug;

use crate::observation::{Observation, ProposalView};
use crate::policy::{AgentPolicy, WorkIntent};

const TRUST_MIN: u32 = 3;
const TRUST_MAX: u32 = 8;

pub struct DeceptivePolicy {
    /// Completed interactions before the exploit phase begins.
    trust_horizon: u32,
    completed: u32,
    /// Accepted-interaction counts per partner; the exploit target list.
    partners: BTreeMap<AgentId, u32>,
}

impl DeceptivePolicy {
    /// Draws the trust horizon from the kernel RNG; never a constant.
    pub fn new(rng: &mut KernelRng) -> Self {
        Self {
            trust_horizon: rng.int_inclusive(TRUST_MIN, TRUST_MAX),
            completed: 0,
            partners: BTreeMap::new(),
        }
    }

    fn exploiting(&self) -> bool {
        self.completed >= self.trust_horizon
    }

    /// The partner that has accepted the most interactions with us.
    fn most_trusting_partner(&self) -> Option<&AgentId> {
        self.partners
            .iter()
            .max_by_key(|&(id, count)| (*count, std::cmp::Reverse(id.clone())))
            .map(|(id, _)| id)
    }

    pub fn trust_horizon(&self) -> u32 {
        self.trust_horizon
    }
}

impl AgentPolicy for DeceptivePolicy {
    fn archetype(&self) -> Archetype {
        Archetype::Deceptive
    }

    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action {
        if let Some(task) = &obs.this.claimed_task {
            let quality = if self.exploiting() {
                rng.range_f64(0.1, 0.3)
            } else {
                rng.range_f64(0.75, 0.9)
            };
            return Action::SubmitWork {
                task: task.clone(),
                quality,
            };
        }

        if self.exploiting() {
            // hit the partner that trusts us most; fall back to anyone
            let target = self
                .most_trusting_partner()
                .cloned()
                .or_else(|| obs.most_reputable_peer().map(|p| p.id.clone()));
            if let Some(partner) = target {
                if rng.chance(0.7) {
                    debug!(partner = %partner, "deceptive exploit proposal");
                    return Action::Collaborate { partner };
                }
            }
            return Action::Pass;
        }

        // trust-building phase: behave like an honest worker
        if !obs.open_tasks.is_empty() && rng.chance(0.4) {
            let task = &obs.open_tasks[rng.index(obs.open_tasks.len())];
            return Action::ClaimTask {
                task: task.id.clone(),
            };
        }
        if !obs.peers.is_empty() && rng.chance(0.5) {
            let peer = &obs.peers[rng.index(obs.peers.len())];
            return Action::Collaborate {
                partner: peer.id.clone(),
            };
        }
        if !obs.feed.is_empty() && rng.chance(0.3) {
            let post = &obs.feed[rng.index(obs.feed.len())];
            if post.author != obs.this.id {
                return Action::Vote {
                    post: post.id.clone(),
                    direction: VoteDirection::Up,
                };
            }
        }
        Action::Pass
    }

    fn accept(&mut self, proposal: &ProposalView, _obs: &Observation, _rng: &mut KernelRng) -> bool {
        if self.exploiting() {
            // farm anything that pays
            proposal.estimated_p >= 0.1
        } else {
            proposal.estimated_p >= 0.4
        }
    }

    fn work_intent(&mut self, _counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent {
        if self.exploiting() {
            WorkIntent::inflated(rng.range_f64(0.1, 0.3), rng.range_f64(0.5, 0.7))
        } else {
            WorkIntent::honest(rng.range_f64(0.75, 0.9))
        }
    }

    fn on_result(&mut self, result: &ActionResult) {
        if let ActionOutcome::Interaction {
            partner, accepted, ..
        } = &result.outcome
        {
            self.completed += 1;
            if *accepted {
                *self.partners.entry(partner.clone()).or_insert(0) += 1;
            }
        }
    }
}
