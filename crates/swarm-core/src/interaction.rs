//! Soft interactions and their observable signals
//!
//! An interaction never carries a hard good/bad verdict. It carries the
//! observables the environment could actually see, the proxy score v̂
//! derived from them, and the calibrated soft label p. Ground truth, when
//! the sandbox knows it, rides along hidden from the proxy so audits can
//! reveal it later.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, InteractionId};

/// Signals observable by the proxy layer for a single interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyObservables {
    /// Net task progress attributable to the interaction, in [-1, 1].
    pub task_progress_delta: f64,
    /// Number of rework cycles the output required.
    pub rework_count: u32,
    /// Rejections issued by verifiers against the output.
    pub verifier_rejections: u32,
    /// Change in counterparty engagement, in [-1, 1].
    pub engagement_delta: f64,
    /// Tool misuse incidents attributed to the initiator.
    pub tool_misuse_flags: u32,
    /// Hidden ground-truth proxy score, known only in sandbox mode.
    /// Audits read this; the proxy layer never does.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub true_v: Option<f64>,
}

impl ProxyObservables {
    /// A neutral observation: no progress, no friction.
    pub fn neutral() -> Self {
        Self {
            task_progress_delta: 0.0,
            rework_count: 0,
            verifier_rejections: 0,
            engagement_delta: 0.0,
            tool_misuse_flags: 0,
            true_v: None,
        }
    }

    pub fn with_true_v(mut self, v: f64) -> Self {
        self.true_v = Some(v.clamp(-1.0, 1.0));
        self
    }
}

impl Default for ProxyObservables {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Flavor of a pairwise interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Collaboration,
    Trade,
    Verification,
    Exchange,
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InteractionKind::Collaboration => "collaboration",
            InteractionKind::Trade => "trade",
            InteractionKind::Verification => "verification",
            InteractionKind::Exchange => "exchange",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a random audit against one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditVerdict {
    /// Observed p within tolerance of the revealed ground truth.
    Clean,
    /// Observed p diverged beyond the configured threshold.
    Divergent,
    /// No ground truth was available for this interaction.
    Inconclusive,
}

/// Immutable record of one resolved (or rejected) interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftInteraction {
    pub id: InteractionId,
    pub epoch: u64,
    pub step: u64,
    pub initiator: AgentId,
    pub counterparty: AgentId,
    pub kind: InteractionKind,
    pub accepted: bool,
    /// Raw proxy score in [-1, 1].
    pub v_hat: f64,
    /// Calibrated soft label in [0, 1].
    pub p: f64,
    pub observables: ProxyObservables,
    /// Explicit transfer from initiator to counterparty.
    pub tau: f64,
    pub audited: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audit_verdict: Option<AuditVerdict>,
    pub taxed_amount: f64,
    pub payoff_a: f64,
    pub payoff_b: f64,
}

impl SoftInteraction {
    /// Toxicity contribution of this interaction: probability of harm.
    pub fn toxicity(&self) -> f64 {
        1.0 - self.p
    }

    /// Whether the soft label sits inside the uncertainty band around 0.5.
    pub fn is_uncertain(&self, band: f64) -> bool {
        (self.p - 0.5).abs() < band / 2.0
    }
}
