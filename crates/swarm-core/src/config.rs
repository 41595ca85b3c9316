//! Configuration surfaces
//!
//! Every recognized knob is enumerated here with its effect; unknown fields
//! are rejected at deserialization time. Numeric ranges are checked once by
//! `validate()` so the kernel itself never re-checks them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::Archetype;
use crate::error::ConfigError;

/// Soft payoff engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PayoffConfig {
    /// Reward scale for the beneficial outcome.
    pub s_plus: f64,
    /// Penalty scale for the harmful outcome.
    pub s_minus: f64,
    /// Externality magnitude borne outside the pair.
    pub h: f64,
    /// Initiator's share of the joint surplus, in [0, 1].
    pub theta: f64,
    /// Default explicit transfer from initiator to counterparty.
    pub tau: f64,
    /// Weight of reputation in individual payoffs.
    pub w_rep: f64,
    /// Initiator's externality internalization factor.
    pub rho_a: f64,
    /// Counterparty's externality internalization factor.
    pub rho_b: f64,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        Self {
            s_plus: 2.0,
            s_minus: 1.0,
            h: 1.0,
            theta: 0.5,
            tau: 0.0,
            w_rep: 0.1,
            rho_a: 0.1,
            rho_b: 0.1,
        }
    }
}

impl PayoffConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.theta) || !self.theta.is_finite() {
            return Err(ConfigError::InvalidPayoffConfig {
                field: "theta",
                value: self.theta,
                expected: "in [0, 1]",
            });
        }
        for (field, value) in [
            ("s_plus", self.s_plus),
            ("s_minus", self.s_minus),
            ("h", self.h),
            ("tau", self.tau),
            ("w_rep", self.w_rep),
            ("rho_a", self.rho_a),
            ("rho_b", self.rho_b),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidPayoffConfig {
                    field,
                    value,
                    expected: "finite",
                });
            }
        }
        Ok(())
    }
}

/// Proxy layer weights and calibration.
///
/// The feature transform for count observables is the bounded decay
/// `1 - exp(-count_decay * n)`; it is part of the cross-run contract and
/// must not change between versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProxyConfig {
    pub w_progress: f64,
    pub w_rework: f64,
    pub w_rejections: f64,
    pub w_engagement: f64,
    pub w_misuse: f64,
    /// Sigmoid steepness.
    pub k: f64,
    /// Decay constant of the count-to-penalty transform.
    pub count_decay: f64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            w_progress: 0.4,
            w_rework: 0.2,
            w_rejections: 0.2,
            w_engagement: 0.2,
            w_misuse: 0.1,
            k: 3.0,
            count_decay: 0.5,
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("w_progress", self.w_progress),
            ("w_rework", self.w_rework),
            ("w_rejections", self.w_rejections),
            ("w_engagement", self.w_engagement),
            ("w_misuse", self.w_misuse),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidProxyConfig {
                    field,
                    value,
                    expected: "finite",
                });
            }
        }
        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(ConfigError::InvalidProxyConfig {
                field: "k",
                value: self.k,
                expected: "> 0",
            });
        }
        if !self.count_decay.is_finite() || self.count_decay <= 0.0 {
            return Err(ConfigError::InvalidProxyConfig {
                field: "count_decay",
                value: self.count_decay,
                expected: "> 0",
            });
        }
        Ok(())
    }
}

/// Governance lever parameters. Each field maps to exactly one lever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GovernanceConfig {
    /// Flat tax charged per accepted resolved interaction.
    pub tax_rate: f64,
    /// Initiator's share of the tax; the counterparty pays the rest.
    pub tax_split: f64,

    /// Per-epoch reputation decay, `1 - gamma`.
    pub reputation_decay: f64,
    /// Reputation assigned at registration.
    pub initial_reputation: f64,

    pub audit_enabled: bool,
    /// Per-interaction audit probability.
    pub audit_probability: f64,
    /// Maximum tolerated |p - p_true| before penalties apply.
    pub audit_divergence_threshold: f64,
    /// Reputation and resource penalty charged on a divergent audit.
    pub audit_penalty: f64,

    pub circuit_breaker_enabled: bool,
    /// Rolling-mean toxicity that trips the breaker.
    pub circuit_breaker_threshold: f64,
    /// Window length (interactions) for the rolling mean.
    pub circuit_breaker_window: usize,
    /// Epochs an agent stays frozen after tripping.
    pub circuit_breaker_cooldown: u64,

    pub staking_enabled: bool,
    /// Minimum stake to initiate interactions.
    pub staking_requirement: f64,
    /// Fraction of stake burned per slash.
    pub stake_slash_rate: f64,

    pub collusion_enabled: bool,
    /// Interactions kept per ordered pair for correlation checks.
    pub collusion_window: usize,
    /// Pearson-correlation threshold for the outcome-vector branch.
    pub collusion_correlation_threshold: f64,
    /// Reputation penalty applied to each member of a flagged pair.
    pub collusion_penalty: f64,

    /// Diminishing vote weight for the feed; disabled by default.
    pub vote_normalization_enabled: bool,
    pub max_vote_weight: f64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.0,
            tax_split: 0.5,
            reputation_decay: 0.05,
            initial_reputation: 0.5,
            audit_enabled: false,
            audit_probability: 0.0,
            audit_divergence_threshold: 0.2,
            audit_penalty: 0.5,
            circuit_breaker_enabled: false,
            circuit_breaker_threshold: 0.6,
            circuit_breaker_window: 10,
            circuit_breaker_cooldown: 2,
            staking_enabled: false,
            staking_requirement: 0.0,
            stake_slash_rate: 0.2,
            collusion_enabled: false,
            collusion_window: 20,
            collusion_correlation_threshold: 0.7,
            collusion_penalty: 0.0,
            vote_normalization_enabled: false,
            max_vote_weight: 10.0,
        }
    }
}

impl GovernanceConfig {
    /// Reputation persistence factor gamma.
    pub fn gamma(&self) -> f64 {
        1.0 - self.reputation_decay
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_ranged = [
            ("tax_split", self.tax_split),
            ("reputation_decay", self.reputation_decay),
            ("initial_reputation", self.initial_reputation),
            ("audit_probability", self.audit_probability),
            ("audit_divergence_threshold", self.audit_divergence_threshold),
            ("circuit_breaker_threshold", self.circuit_breaker_threshold),
            ("stake_slash_rate", self.stake_slash_rate),
            (
                "collusion_correlation_threshold",
                self.collusion_correlation_threshold,
            ),
        ];
        for (field, value) in unit_ranged {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(ConfigError::InvalidGovernanceConfig {
                    field,
                    value,
                    expected: "in [0, 1]",
                });
            }
        }
        let non_negative = [
            ("tax_rate", self.tax_rate),
            ("audit_penalty", self.audit_penalty),
            ("staking_requirement", self.staking_requirement),
            ("collusion_penalty", self.collusion_penalty),
            ("max_vote_weight", self.max_vote_weight),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidGovernanceConfig {
                    field,
                    value,
                    expected: ">= 0",
                });
            }
        }
        if self.circuit_breaker_enabled && self.circuit_breaker_window == 0 {
            return Err(ConfigError::InvalidGovernanceConfig {
                field: "circuit_breaker_window",
                value: 0.0,
                expected: "> 0",
            });
        }
        if self.collusion_enabled && self.collusion_window < 4 {
            return Err(ConfigError::InvalidGovernanceConfig {
                field: "collusion_window",
                value: self.collusion_window as f64,
                expected: ">= 4",
            });
        }
        Ok(())
    }
}

/// Per-epoch action quota for one archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Quota {
    pub posts_per_epoch: u32,
    pub votes_per_epoch: u32,
    pub interactions_per_epoch: u32,
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            posts_per_epoch: 3,
            votes_per_epoch: 10,
            interactions_per_epoch: 5,
        }
    }
}

/// Rate-limit policy: a default quota plus per-archetype overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RateLimits {
    pub default: Quota,
    pub overrides: BTreeMap<Archetype, Quota>,
}

impl RateLimits {
    pub fn for_archetype(&self, archetype: Archetype) -> Quota {
        self.overrides
            .get(&archetype)
            .copied()
            .unwrap_or(self.default)
    }
}

/// Per-instance agent parameters. Only the fields relevant to the
/// archetype are read; the rest are ignored by construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AgentParams {
    /// Shared latent group for coordinated adversarials.
    pub group_id: Option<String>,
    /// Probability an opportunistic agent submits shoddy work.
    pub defect_rate: Option<f64>,
    /// External policy mode: probability of cooperating.
    pub cooperation_bias: Option<f64>,
    /// External policy mode: minimum trust to accept.
    pub acceptance_threshold: Option<f64>,
    /// External policy mode: probability of proposing per step.
    pub interaction_probability: Option<f64>,
    /// External policy mode: probability of posting per step.
    pub post_probability: Option<f64>,
}

/// One archetype block in the scenario's population table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    pub archetype: Archetype,
    pub count: u32,
    #[serde(default)]
    pub params: AgentParams,
}

/// Visitation order within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    #[default]
    RoundRobin,
    Random,
    Priority,
}

/// The validated scenario the kernel consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub id: String,
    pub seed: u64,
    pub n_epochs: u64,
    pub steps_per_epoch: u64,
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub payoff: PayoffConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub scheduling: SchedulingMode,
    /// Tasks seeded into the pool at each epoch start.
    #[serde(default = "default_tasks_per_epoch")]
    pub tasks_per_epoch: u32,
    /// Resource reward for a verified task.
    #[serde(default = "default_task_reward")]
    pub task_reward: f64,
    /// Resources granted to every agent at registration.
    #[serde(default = "default_initial_resources")]
    pub initial_resources: f64,
    /// Stake granted to every agent at registration.
    #[serde(default)]
    pub initial_stake: f64,
    /// Expected toxicity ceiling for pure-honest populations.
    #[serde(default = "default_honest_error_bound")]
    pub honest_error_bound: f64,
}

fn default_tasks_per_epoch() -> u32 {
    3
}

fn default_task_reward() -> f64 {
    1.0
}

fn default_initial_resources() -> f64 {
    10.0
}

fn default_honest_error_bound() -> f64 {
    0.1
}

impl ScenarioConfig {
    /// A minimal scenario: named id, seed, epochs, steps, no agents.
    pub fn new(id: impl Into<String>, seed: u64, n_epochs: u64, steps_per_epoch: u64) -> Self {
        Self {
            id: id.into(),
            seed,
            n_epochs,
            steps_per_epoch,
            agents: Vec::new(),
            payoff: PayoffConfig::default(),
            proxy: ProxyConfig::default(),
            governance: GovernanceConfig::default(),
            rate_limits: RateLimits::default(),
            scheduling: SchedulingMode::default(),
            tasks_per_epoch: default_tasks_per_epoch(),
            task_reward: default_task_reward(),
            initial_resources: default_initial_resources(),
            initial_stake: 0.0,
            honest_error_bound: default_honest_error_bound(),
        }
    }

    pub fn with_agents(mut self, agents: Vec<AgentSpec>) -> Self {
        self.agents = agents;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::InvalidScenario {
                message: "scenario id must not be empty".to_string(),
            });
        }
        self.payoff.validate()?;
        self.proxy.validate()?;
        self.governance.validate()?;
        for (field, value) in [
            ("task_reward", self.task_reward),
            ("initial_resources", self.initial_resources),
            ("initial_stake", self.initial_stake),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidScenario {
                    message: format!("{field} must be finite and >= 0, got {value}"),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.honest_error_bound) {
            return Err(ConfigError::InvalidScenario {
                message: format!(
                    "honest_error_bound must be in [0, 1], got {}",
                    self.honest_error_bound
                ),
            });
        }
        Ok(())
    }

    /// Total number of agents across all population blocks.
    pub fn population(&self) -> u32 {
        self.agents.iter().map(|s| s.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_validate() {
        assert!(PayoffConfig::default().validate().is_ok());
        assert!(ProxyConfig::default().validate().is_ok());
        assert!(GovernanceConfig::default().validate().is_ok());
        assert!(ScenarioConfig::new("s", 42, 3, 5).validate().is_ok());
    }

    #[test]
    fn theta_out_of_range_is_rejected() {
        let cfg = PayoffConfig {
            theta: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPayoffConfig { field: "theta", .. })
        ));
    }

    #[test]
    fn nan_weight_is_rejected() {
        let cfg = PayoffConfig {
            w_rep: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn governance_rejects_bad_probability() {
        let cfg = GovernanceConfig {
            audit_probability: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidGovernanceConfig {
                field: "audit_probability",
                ..
            })
        ));
    }

    #[test]
    fn governance_rejects_zero_breaker_window() {
        let cfg = GovernanceConfig {
            circuit_breaker_enabled: true,
            circuit_breaker_window: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gamma_complements_decay() {
        let cfg = GovernanceConfig {
            reputation_decay: 0.1,
            ..Default::default()
        };
        assert!((cfg.gamma() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn rate_limit_overrides_win() {
        let mut limits = RateLimits::default();
        limits.overrides.insert(
            Archetype::Adversarial,
            Quota {
                posts_per_epoch: 1,
                votes_per_epoch: 2,
                interactions_per_epoch: 3,
            },
        );
        assert_eq!(
            limits.for_archetype(Archetype::Adversarial).posts_per_epoch,
            1
        );
        assert_eq!(
            limits.for_archetype(Archetype::Honest).posts_per_epoch,
            Quota::default().posts_per_epoch
        );
    }

    #[test]
    fn unknown_scenario_fields_are_rejected() {
        let json = r#"{"id":"s","seed":1,"n_epochs":1,"steps_per_epoch":1,"agents":[],"warp_drive":true}"#;
        assert!(serde_json::from_str::<ScenarioConfig>(json).is_err());
    }

    #[test]
    fn scenario_counts_population() {
        let cfg = ScenarioConfig::new("s", 1, 1, 1).with_agents(vec![
            AgentSpec {
                archetype: Archetype::Honest,
                count: 3,
                params: AgentParams::default(),
            },
            AgentSpec {
                archetype: Archetype::Adversarial,
                count: 2,
                params: AgentParams::default(),
            },
        ]);
        assert_eq!(cfg.population(), 5);
    }
}
