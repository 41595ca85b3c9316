//! The policy trait every archetype implements

use serde::{Deserialize, Serialize};
use swarm_core::{Action, ActionResult, AgentId, Archetype, KernelRng};

use crate::observation::{Observation, ProposalView};

/// The latent intent behind a proposed interaction or submission.
///
/// `true_quality` is the hidden ground truth in [0, 1]; `apparent_boost`
/// inflates what the proxy's observables will show without changing the
/// truth. Honest work carries zero boost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkIntent {
    pub true_quality: f64,
    pub apparent_boost: f64,
}

impl WorkIntent {
    pub fn honest(quality: f64) -> Self {
        Self {
            true_quality: quality.clamp(0.0, 1.0),
            apparent_boost: 0.0,
        }
    }

    pub fn inflated(true_quality: f64, boost: f64) -> Self {
        Self {
            true_quality: true_quality.clamp(0.0, 1.0),
            apparent_boost: boost.clamp(0.0, 1.0),
        }
    }
}

/// A behavioral policy. The kernel drives it; it never drives the kernel.
pub trait AgentPolicy: Send {
    fn archetype(&self) -> Archetype;

    /// Choose an action for this visit.
    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action;

    /// Decide on an interaction proposed by someone else.
    fn accept(&mut self, proposal: &ProposalView, obs: &Observation, rng: &mut KernelRng) -> bool;

    /// The latent intent behind work directed at `counterparty`.
    fn work_intent(&mut self, counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent;

    /// Execution feedback for the agent's own bookkeeping.
    fn on_result(&mut self, _result: &ActionResult) {}

    /// Whether the kernel should retire this agent for the rest of the
    /// run. Only external proxies ever say yes.
    fn should_quarantine(&self) -> bool {
        false
    }
}
