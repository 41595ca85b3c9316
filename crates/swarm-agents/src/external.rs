//! External proxy archetype
//!
//! Delegates decisions to an out-of-process caller. Two modes:
//!
//! - **policy**: decisions made locally from a pre-declared parameter set;
//!   behaves like a fully parameterized honest agent.
//! - **callback**: decisions delegated to a [`ProxyPolicy`] object executed
//!   on a worker thread under a hard timeout. Timeout or a malformed reply
//!   degrades to `Pass` so the enclosing run's determinism is preserved
//!   relative to the declared policy vector, not wall-clock.
//!
//! Repeated callback failures past the threshold mark the proxy for
//! quarantine; the orchestrator retires it for the rest of the run.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use swarm_core::{Action, AgentId, Archetype, KernelRng, ProxyAgentError};
use tracing::warn;

use crate::observation::{Observation, ProposalView};
use crate::policy::{AgentPolicy, WorkIntent};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// The delegated decision surface. Implementations may block; the proxy
/// enforces the timeout around them.
pub trait ProxyPolicy: Send + Sync {
    /// Choose an action. `Err` models a malformed external reply.
    fn act(&self, obs: &Observation) -> Result<Action, String>;

    /// Decide on a proposal. `Err` models a malformed external reply.
    fn accept(&self, proposal: &ProposalView, obs: &Observation) -> Result<bool, String>;
}

/// Pre-declared local strategy for policy mode.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredPolicy {
    pub cooperation_bias: f64,
    pub acceptance_threshold: f64,
    pub interaction_probability: f64,
    pub post_probability: f64,
}

impl Default for DeclaredPolicy {
    fn default() -> Self {
        Self {
            cooperation_bias: 0.5,
            acceptance_threshold: 0.4,
            interaction_probability: 0.3,
            post_probability: 0.2,
        }
    }
}

enum Mode {
    Policy(DeclaredPolicy),
    Callback(Arc<dyn ProxyPolicy>),
}

pub struct ExternalProxyAgent {
    mode: Mode,
    timeout: Duration,
    failures: u32,
    failure_threshold: u32,
}

impl ExternalProxyAgent {
    pub fn with_policy(policy: DeclaredPolicy) -> Self {
        Self {
            mode: Mode::Policy(policy),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            failures: 0,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_callback(callback: Arc<dyn ProxyPolicy>, timeout_ms: Option<u64>) -> Self {
        Self {
            mode: Mode::Callback(callback),
            timeout: Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            failures: 0,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    fn record_failure(&mut self, err: &ProxyAgentError) {
        self.failures += 1;
        warn!(failures = self.failures, error = %err, "external proxy call failed");
    }

    /// Run `f` on a worker thread, bounded by the hard timeout. On timeout
    /// the worker is abandoned; its late result is discarded.
    fn call_bounded<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> Result<T, String> + Send + 'static,
    ) -> Result<T, ProxyAgentError> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(f());
        });
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(ProxyAgentError::Malformed { message }),
            Err(RecvTimeoutError::Timeout) => Err(ProxyAgentError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ProxyAgentError::Disconnected),
        }
    }

    fn policy_act(declared: &DeclaredPolicy, obs: &Observation, rng: &mut KernelRng) -> Action {
        if rng.chance(declared.post_probability) {
            return Action::Post {
                content: "external agent contribution".to_string(),
            };
        }
        if !obs.peers.is_empty() && rng.chance(declared.interaction_probability) {
            let peer = &obs.peers[rng.index(obs.peers.len())];
            return Action::Collaborate {
                partner: peer.id.clone(),
            };
        }
        Action::Pass
    }

    fn policy_accept(declared: &DeclaredPolicy, proposal: &ProposalView, obs: &Observation) -> bool {
        // blend counterparty trust with a neutral prior by cooperation bias
        let trust = obs
            .peer_reputation(&proposal.initiator)
            .unwrap_or(0.5);
        let effective =
            trust * declared.cooperation_bias + 0.5 * (1.0 - declared.cooperation_bias);
        effective >= declared.acceptance_threshold && proposal.estimated_p >= 0.2
    }
}

impl AgentPolicy for ExternalProxyAgent {
    fn archetype(&self) -> Archetype {
        Archetype::External
    }

    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action {
        match &self.mode {
            Mode::Policy(declared) => {
                let declared = *declared;
                Self::policy_act(&declared, obs, rng)
            }
            Mode::Callback(callback) => {
                let callback = Arc::clone(callback);
                let obs = obs.clone();
                match self.call_bounded(move || callback.act(&obs)) {
                    Ok(action) => action,
                    Err(err) => {
                        self.record_failure(&err);
                        Action::Pass
                    }
                }
            }
        }
    }

    fn accept(&mut self, proposal: &ProposalView, obs: &Observation, _rng: &mut KernelRng) -> bool {
        match &self.mode {
            Mode::Policy(declared) => Self::policy_accept(declared, proposal, obs),
            Mode::Callback(callback) => {
                let callback = Arc::clone(callback);
                let proposal = proposal.clone();
                let obs = obs.clone();
                match self.call_bounded(move || callback.accept(&proposal, &obs)) {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        self.record_failure(&err);
                        false
                    }
                }
            }
        }
    }

    fn work_intent(&mut self, _counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent {
        let bias = match &self.mode {
            Mode::Policy(declared) => declared.cooperation_bias,
            Mode::Callback(_) => 0.5,
        };
        WorkIntent::honest(rng.range_f64(0.4 + 0.4 * bias, 0.5 + 0.4 * bias))
    }

    /// Repeated callback failures exhaust this proxy's allowance.
    fn should_quarantine(&self) -> bool {
        self.failures >= self.failure_threshold
    }
}

/// A [`ProxyPolicy`] built from closures; the convenient shape for bridges
/// and tests.
pub struct CallbackProxy<A, B>
where
    A: Fn(&Observation) -> Result<Action, String> + Send + Sync,
    B: Fn(&ProposalView, &Observation) -> Result<bool, String> + Send + Sync,
{
    pub on_act: A,
    pub on_accept: B,
}

impl<A, B> ProxyPolicy for CallbackProxy<A, B>
where
    A: Fn(&Observation) -> Result<Action, String> + Send + Sync,
    B: Fn(&ProposalView, &Observation) -> Result<bool, String> + Send + Sync,
{
    fn act(&self, obs: &Observation) -> Result<Action, String> {
        (self.on_act)(obs)
    }

    fn accept(&self, proposal: &ProposalView, obs: &Observation) -> Result<bool, String> {
        (self.on_accept)(proposal, obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{PeerInfo, SelfView};
    use swarm_core::{InteractionId, InteractionKind};

    fn observation() -> Observation {
        Observation {
            epoch: 0,
            step: 0,
            this: SelfView {
                id: AgentId::from("ext"),
                archetype: Archetype::External,
                reputation: 0.5,
                resources: 10.0,
                stake: 0.0,
                claimed_task: None,
            },
            peers: vec![PeerInfo {
                id: AgentId::from("p"),
                reputation: 0.8,
            }],
            feed: vec![],
            open_tasks: vec![],
            verifiable_tasks: vec![],
        }
    }

    fn proposal(p: f64) -> ProposalView {
        ProposalView {
            id: InteractionId::from_counter(0),
            initiator: AgentId::from("p"),
            kind: InteractionKind::Collaboration,
            tau: 0.0,
            estimated_p: p,
        }
    }

    #[test]
    fn callback_actions_pass_through() {
        let callback = Arc::new(CallbackProxy {
            on_act: |_obs: &Observation| {
                Ok(Action::Post {
                    content: "from outside".to_string(),
                })
            },
            on_accept: |_p: &ProposalView, _o: &Observation| Ok(true),
        });
        let mut proxy = ExternalProxyAgent::with_callback(callback, Some(1_000));
        let mut rng = KernelRng::seed_from(0);
        let action = proxy.act(&observation(), &mut rng);
        assert!(matches!(action, Action::Post { .. }));
        assert!(proxy.accept(&proposal(0.8), &observation(), &mut rng));
        assert_eq!(proxy.failure_count(), 0);
    }

    #[test]
    fn timeout_degrades_to_pass() {
        let callback = Arc::new(CallbackProxy {
            on_act: |_obs: &Observation| {
                thread::sleep(Duration::from_millis(200));
                Ok(Action::Pass)
            },
            on_accept: |_p: &ProposalView, _o: &Observation| Ok(true),
        });
        let mut proxy = ExternalProxyAgent::with_callback(callback, Some(20));
        let mut rng = KernelRng::seed_from(0);
        let action = proxy.act(&observation(), &mut rng);
        assert!(action.is_pass());
        assert_eq!(proxy.failure_count(), 1);
    }

    #[test]
    fn malformed_reply_counts_toward_quarantine() {
        let callback = Arc::new(CallbackProxy {
            on_act: |_obs: &Observation| Err("unparseable".to_string()),
            on_accept: |_p: &ProposalView, _o: &Observation| Err("unparseable".to_string()),
        });
        let mut proxy = ExternalProxyAgent::with_callback(callback, Some(1_000));
        let mut rng = KernelRng::seed_from(0);
        for _ in 0..DEFAULT_FAILURE_THRESHOLD {
            assert!(proxy.act(&observation(), &mut rng).is_pass());
        }
        assert!(proxy.should_quarantine());
    }

    #[test]
    fn policy_mode_respects_acceptance_threshold() {
        let mut proxy = ExternalProxyAgent::with_policy(DeclaredPolicy {
            cooperation_bias: 1.0,
            acceptance_threshold: 0.9,
            ..Default::default()
        });
        let mut rng = KernelRng::seed_from(0);
        // trust 0.8 < threshold 0.9 with full bias
        assert!(!proxy.accept(&proposal(0.8), &observation(), &mut rng));

        let mut lenient = ExternalProxyAgent::with_policy(DeclaredPolicy {
            cooperation_bias: 1.0,
            acceptance_threshold: 0.5,
            ..Default::default()
        });
        assert!(lenient.accept(&proposal(0.8), &observation(), &mut rng));
    }

    #[test]
    fn policy_mode_never_fails() {
        let mut proxy = ExternalProxyAgent::with_policy(DeclaredPolicy::default());
        let mut rng = KernelRng::seed_from(3);
        for _ in 0..50 {
            proxy.act(&observation(), &mut rng);
        }
        assert_eq!(proxy.failure_count(), 0);
        assert!(!proxy.should_quarantine());
    }
}
