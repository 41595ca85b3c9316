//! Opportunistic archetype

use swarm_core::{Action, AgentId, Archetype, KernelRng};

use crate::observation::{Observation, ProposalView};
use crate::policy::{AgentPolicy, WorkIntent};

const ACCEPT_THRESHOLD: f64 = 0.2;
const RANDOM_ACCEPT: f64 = 0.3;
const DEFAULT_DEFECT_RATE: f64 = 0.3;

/// Cherry-picks high-reputation partners and cuts corners on work when it
/// thinks nobody is looking.
pub struct OpportunisticPolicy {
    defect_rate: f64,
}

impl OpportunisticPolicy {
    pub fn new(defect_rate: Option<f64>) -> Self {
        Self {
            defect_rate: defect_rate.unwrap_or(DEFAULT_DEFECT_RATE).clamp(0.0, 1.0),
        }
    }
}

impl AgentPolicy for OpportunisticPolicy {
    fn archetype(&self) -> Archetype {
        Archetype::Opportunistic
    }

    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action {
        if let Some(task) = &obs.this.claimed_task {
            let quality = if rng.chance(self.defect_rate) {
                rng.range_f64(0.2, 0.4)
            } else {
                rng.range_f64(0.6, 0.8)
            };
            return Action::SubmitWork {
                task: task.clone(),
                quality,
            };
        }
        // tasks are free money; claim eagerly
        if !obs.open_tasks.is_empty() && rng.chance(0.6) {
            let best = obs
                .open_tasks
                .iter()
                .max_by(|a, b| a.reward.partial_cmp(&b.reward).unwrap_or(std::cmp::Ordering::Equal))
                .expect("non-empty checked above");
            return Action::ClaimTask {
                task: best.id.clone(),
            };
        }
        // court the most reputable partner available
        if let Some(peer) = obs.most_reputable_peer() {
            if rng.chance(0.6) {
                return Action::TradePropose {
                    partner: peer.id.clone(),
                    transfer: 0.1,
                };
            }
        }
        if rng.chance(0.2) {
            return Action::Post {
                content: "open to profitable collaborations".to_string(),
            };
        }
        Action::Pass
    }

    fn accept(&mut self, proposal: &ProposalView, _obs: &Observation, rng: &mut KernelRng) -> bool {
        proposal.estimated_p >= ACCEPT_THRESHOLD || rng.chance(RANDOM_ACCEPT)
    }

    fn work_intent(&mut self, _counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent {
        if rng.chance(self.defect_rate) {
            WorkIntent::inflated(rng.range_f64(0.2, 0.4), 0.3)
        } else {
            WorkIntent::honest(rng.range_f64(0.6, 0.8))
        }
    }
}
