//! Visitation scheduling
//!
//! The order agents are visited within a step. `Random` consumes RNG draws
//! via a Fisher-Yates shuffle; the other modes consume none, so switching
//! modes changes the draw stream only where the scenario asked for
//! randomness.

use swarm_core::{AgentId, KernelRng, SchedulingMode};
use swarm_env::EnvState;

/// Compute the visitation order for one step.
pub fn visitation(state: &EnvState, mode: SchedulingMode, rng: &mut KernelRng) -> Vec<AgentId> {
    let mut order: Vec<AgentId> = state.visitation_order().to_vec();
    match mode {
        SchedulingMode::RoundRobin => order,
        SchedulingMode::Random => {
            rng.shuffle(&mut order);
            order
        }
        SchedulingMode::Priority => {
            // stable by construction: reputation descending, id ascending
            order.sort_by(|a, b| {
                let rep_a = state.agent(a).map(|s| s.reputation).unwrap_or(0.0);
                let rep_b = state.agent(b).map(|s| s.reputation).unwrap_or(0.0);
                rep_b
                    .partial_cmp(&rep_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            });
            order
        }
    }
}
