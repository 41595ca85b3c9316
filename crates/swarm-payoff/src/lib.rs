//! SWARM Payoff - soft payoff engine
//!
//! Pure functions of the interaction's soft label, the payoff
//! configuration, the governance costs and the parties' reputations:
//!
//! ```text
//! S_soft = p * s_plus - (1 - p) * s_minus
//! E_soft = (1 - p) * h
//! pi_a   = theta * S_soft       - tau - c_a - rho_a * E_soft + w_rep * r_a
//! pi_b   = (1 - theta) * S_soft + tau - c_b - rho_b * E_soft + w_rep * r_b
//! ```
//!
//! Rejected interactions pay `(0, 0)`. The engine refuses an invalid
//! configuration at construction; after that every output is finite for
//! bounded inputs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use swarm_core::{ConfigError, PayoffConfig, SoftInteraction};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayoffError {
    #[error("invalid payoff config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PayoffError>;

/// Governance costs charged against one interaction's two parties.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PairCosts {
    pub c_a: f64,
    pub c_b: f64,
}

impl PairCosts {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Per-party payoffs for one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairPayoffs {
    pub initiator: f64,
    pub counterparty: f64,
}

impl PairPayoffs {
    pub fn zero() -> Self {
        Self {
            initiator: 0.0,
            counterparty: 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.initiator + self.counterparty
    }
}

/// The soft payoff engine.
#[derive(Debug, Clone)]
pub struct PayoffEngine {
    config: PayoffConfig,
}

impl PayoffEngine {
    /// Build an engine, rejecting an out-of-range configuration.
    pub fn new(config: PayoffConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PayoffConfig {
        &self.config
    }

    /// Expected joint surplus `S_soft` for soft label `p`.
    pub fn expected_surplus(&self, p: f64) -> f64 {
        p * self.config.s_plus - (1.0 - p) * self.config.s_minus
    }

    /// Expected externality `E_soft` for soft label `p`.
    pub fn expected_externality(&self, p: f64) -> f64 {
        (1.0 - p) * self.config.h
    }

    /// Payoffs for a resolved interaction given governance costs and the
    /// parties' current reputations. Rejected interactions pay zero.
    pub fn payoffs(
        &self,
        interaction: &SoftInteraction,
        costs: PairCosts,
        rep_a: f64,
        rep_b: f64,
    ) -> PairPayoffs {
        if !interaction.accepted {
            return PairPayoffs::zero();
        }
        let c = &self.config;
        let s_soft = self.expected_surplus(interaction.p);
        let e_soft = self.expected_externality(interaction.p);
        let tau = interaction.tau;
        PairPayoffs {
            initiator: c.theta * s_soft - tau - costs.c_a - c.rho_a * e_soft + c.w_rep * rep_a,
            counterparty: (1.0 - c.theta) * s_soft + tau - costs.c_b - c.rho_b * e_soft
                + c.w_rep * rep_b,
        }
    }

    /// Joint welfare of an accepted interaction (zero when rejected).
    pub fn total_welfare(
        &self,
        interaction: &SoftInteraction,
        costs: PairCosts,
        rep_a: f64,
        rep_b: f64,
    ) -> f64 {
        self.payoffs(interaction, costs, rep_a, rep_b).total()
    }

    /// Surplus net of the full externality, independent of the split.
    pub fn social_surplus(&self, p: f64) -> f64 {
        self.expected_surplus(p) - self.expected_externality(p)
    }
}
