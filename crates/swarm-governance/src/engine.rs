//! The governance engine
//!
//! Evaluates levers per resolved interaction in the contract order
//! tax -> audit -> circuit breaker -> stake check -> collusion, and applies
//! the epoch-boundary levers (unfreeze, reputation blend). The RNG draw
//! discipline matters for replay: when auditing is enabled, exactly one
//! draw is consumed per resolved interaction whether or not the audit
//! fires.

use std::collections::BTreeMap;

use tracing::{debug, info};

use swarm_core::{
    ActionError, AgentId, AuditVerdict, GovernanceConfig, KernelRng, SoftInteraction,
};
use swarm_env::EnvState;
use swarm_proxy::soft_label;

use crate::breaker::CircuitBreaker;
use crate::collusion::CollusionDetector;
use crate::ruling::{EpochEndRuling, EpochStartRuling, InteractionRuling};

pub struct GovernanceEngine {
    config: GovernanceConfig,
    /// Sigmoid steepness, shared with the proxy layer so audits compare
    /// like with like.
    k: f64,
    breaker: CircuitBreaker,
    collusion: CollusionDetector,
    /// Accepted soft labels per agent this epoch, for the reputation blend.
    epoch_p: BTreeMap<AgentId, (f64, u64)>,
}

impl GovernanceEngine {
    pub fn new(config: GovernanceConfig, k: f64) -> Self {
        let breaker = CircuitBreaker::new(
            config.circuit_breaker_window.max(1),
            config.circuit_breaker_threshold,
        );
        let collusion = CollusionDetector::new(
            config.collusion_window.max(1),
            config.collusion_correlation_threshold,
        );
        Self {
            config,
            k,
            breaker,
            collusion,
            epoch_p: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Epoch boundaries
    // ------------------------------------------------------------------

    /// Epoch start: release agents whose cooldown has expired and reset the
    /// per-epoch label accumulator.
    pub fn on_epoch_start(&mut self, state: &EnvState, epoch: u64) -> EpochStartRuling {
        self.epoch_p.clear();
        let unfreeze = state
            .agents()
            .filter(|a| matches!(a.frozen_until, Some(until) if epoch >= until))
            .map(|a| a.id.clone())
            .collect();
        EpochStartRuling { unfreeze }
    }

    /// Epoch end: blend each agent's reputation toward its mean accepted
    /// soft label, `r <- gamma * r + (1 - gamma) * p_bar`. Agents without
    /// interactions this epoch decay through the gamma term alone.
    pub fn on_epoch_end(&mut self, state: &EnvState, _epoch: u64) -> EpochEndRuling {
        let gamma = self.config.gamma();
        let mut updates = Vec::new();
        for agent in state.agents() {
            let blended = match self.epoch_p.get(&agent.id) {
                Some((sum, n)) if *n > 0 => {
                    let p_bar = sum / *n as f64;
                    gamma * agent.reputation + (1.0 - gamma) * p_bar
                }
                _ => gamma * agent.reputation,
            };
            updates.push((agent.id.clone(), blended.clamp(0.0, 1.0)));
        }
        self.epoch_p.clear();
        EpochEndRuling {
            reputation_updates: updates,
        }
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Stake gate: may this agent initiate interactions?
    pub fn can_initiate(&self, state: &EnvState, agent: &AgentId) -> Result<(), ActionError> {
        if !self.config.staking_enabled {
            return Ok(());
        }
        let Some(agent_state) = state.agent(agent) else {
            return Ok(());
        };
        if agent_state.stake < self.config.staking_requirement {
            return Err(ActionError::InsufficientStake {
                stake: agent_state.stake,
                required: self.config.staking_requirement,
            });
        }
        Ok(())
    }

    /// Diminishing vote weight, 1.0 when normalization is disabled.
    pub fn vote_weight(&self, votes_cast: u32) -> f64 {
        if !self.config.vote_normalization_enabled {
            return 1.0;
        }
        let max = self.config.max_vote_weight;
        (max / (1.0 + f64::from(votes_cast) / max)) / max
    }

    /// A vote or verification happened outside interaction resolution.
    /// Feeds the collusion pair statistics; may flag the pair.
    pub fn on_social_event(
        &mut self,
        a: &AgentId,
        b: &AgentId,
        positive: bool,
        epoch: u64,
    ) -> Option<(AgentId, AgentId)> {
        if !self.config.collusion_enabled {
            return None;
        }
        self.collusion.record_social_event(a, b, positive);
        if self.collusion.evaluate(a, b, epoch) {
            info!(a = %a, b = %b, "collusion pair flagged");
            Some((a.clone(), b.clone()))
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Per-interaction lever stack
    // ------------------------------------------------------------------

    /// Evaluate all levers for one resolved interaction, in contract order.
    pub fn on_interaction(
        &mut self,
        interaction: &SoftInteraction,
        state: &EnvState,
        rng: &mut KernelRng,
    ) -> InteractionRuling {
        let mut ruling = InteractionRuling::default();
        let initiator = &interaction.initiator;
        let counterparty = &interaction.counterparty;

        // 1. Transaction tax: flat charge per accepted interaction.
        if interaction.accepted && self.config.tax_rate > 0.0 {
            ruling.taxed_amount = self.config.tax_rate;
            ruling.cost_a = ruling.taxed_amount * self.config.tax_split;
            ruling.cost_b = ruling.taxed_amount * (1.0 - self.config.tax_split);
        }

        // 2. Random audit. One draw per resolved interaction when enabled.
        if self.config.audit_enabled {
            let roll = rng.next_f64();
            if roll < self.config.audit_probability {
                ruling.audited = true;
                let verdict = self.audit_verdict(interaction);
                ruling.audit_verdict = Some(verdict);
                if verdict == AuditVerdict::Divergent {
                    let penalty = self.config.audit_penalty;
                    ruling.cost_a += penalty;
                    ruling
                        .reputation_deltas
                        .push((initiator.clone(), -penalty));
                    if self.config.staking_enabled {
                        ruling.slash =
                            Some((initiator.clone(), self.config.stake_slash_rate));
                    }
                    debug!(agent = %initiator, penalty, "audit divergence penalty");
                }
            }
        }

        // 3. Circuit breaker: windowed toxicity of the initiator.
        if self.config.circuit_breaker_enabled && interaction.accepted {
            let tripped = self.breaker.observe(initiator, interaction.toxicity());
            if tripped {
                let until = state.current_epoch + self.config.circuit_breaker_cooldown;
                ruling.freeze = Some((initiator.clone(), until));
                info!(agent = %initiator, until, "circuit breaker tripped");
            }
        }

        // 4. Stake check: the slash decided above executes here in order;
        //    nothing extra to decide when no audit fired.

        // 5. Collusion update for the interacting pair.
        if self.config.collusion_enabled {
            self.collusion.record_outcome(initiator, interaction.p);
            self.collusion.record_outcome(counterparty, interaction.p);
            self.collusion.record_social_event(
                initiator,
                counterparty,
                interaction.accepted && interaction.p >= 0.5,
            );
            if self
                .collusion
                .evaluate(initiator, counterparty, state.current_epoch)
            {
                ruling
                    .flagged_pairs
                    .push((initiator.clone(), counterparty.clone()));
                if self.config.collusion_penalty > 0.0 {
                    ruling
                        .reputation_deltas
                        .push((initiator.clone(), -self.config.collusion_penalty));
                    ruling
                        .reputation_deltas
                        .push((counterparty.clone(), -self.config.collusion_penalty));
                }
            }
        }

        // Reputation blend input: accepted labels only.
        if interaction.accepted {
            for agent in [initiator, counterparty] {
                let entry = self.epoch_p.entry(agent.clone()).or_insert((0.0, 0));
                entry.0 += interaction.p;
                entry.1 += 1;
            }
        }

        ruling
    }

    fn audit_verdict(&self, interaction: &SoftInteraction) -> AuditVerdict {
        match interaction.observables.true_v {
            None => AuditVerdict::Inconclusive,
            Some(true_v) => {
                let p_true = soft_label(true_v, self.k);
                if (interaction.p - p_true).abs() > self.config.audit_divergence_threshold {
                    AuditVerdict::Divergent
                } else {
                    AuditVerdict::Clean
                }
            }
        }
    }

    /// Rolling toxicity for an agent, for observability surfaces.
    pub fn rolling_toxicity(&self, agent: &AgentId) -> f64 {
        self.breaker.rolling_toxicity(agent)
    }
}
