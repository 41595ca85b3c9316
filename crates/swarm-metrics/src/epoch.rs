//! Per-epoch metric snapshot

use serde::{Deserialize, Serialize};
use swarm_core::SoftInteraction;

use crate::calibration::{brier_score, expected_calibration_error};
use crate::soft;

/// Everything downstream needs to know about one epoch, in one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: u64,
    pub total_interactions: u64,
    pub accepted_interactions: u64,
    pub rejected_interactions: u64,
    pub toxicity_rate: f64,
    pub quality_gap: f64,
    pub conditional_loss: f64,
    pub mean_p: f64,
    pub var_p: f64,
    pub total_welfare: f64,
    pub avg_payoff: f64,
    pub gini_payoff: f64,
    pub frozen_agents: u64,
    pub flagged_pairs: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub brier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ece: Option<f64>,
}

impl EpochMetrics {
    /// Compute the snapshot from one epoch's resolved interactions and the
    /// per-agent payoff totals at epoch end.
    pub fn compute(
        epoch: u64,
        interactions: &[SoftInteraction],
        agent_payoff_totals: &[f64],
        frozen_agents: u64,
        flagged_pairs: u64,
    ) -> Self {
        let accepted = interactions.iter().filter(|i| i.accepted).count() as u64;
        let total = interactions.len() as u64;
        let welfare = soft::total_welfare(interactions);
        let avg_payoff = if accepted > 0 {
            welfare / (2.0 * accepted as f64)
        } else {
            0.0
        };
        Self {
            epoch,
            total_interactions: total,
            accepted_interactions: accepted,
            rejected_interactions: total - accepted,
            toxicity_rate: soft::toxicity_rate(interactions),
            quality_gap: soft::quality_gap(interactions),
            conditional_loss: soft::conditional_loss_initiator(interactions),
            mean_p: soft::mean_p(interactions),
            var_p: soft::var_p(interactions),
            total_welfare: welfare,
            avg_payoff,
            gini_payoff: soft::gini(agent_payoff_totals),
            frozen_agents,
            flagged_pairs,
            brier: brier_score(interactions),
            ece: expected_calibration_error(interactions),
        }
    }

    /// An all-zero snapshot for epochs with no interactions.
    pub fn empty(epoch: u64, frozen_agents: u64) -> Self {
        Self {
            epoch,
            total_interactions: 0,
            accepted_interactions: 0,
            rejected_interactions: 0,
            toxicity_rate: 0.0,
            quality_gap: 0.0,
            conditional_loss: 0.0,
            mean_p: 0.0,
            var_p: 0.0,
            total_welfare: 0.0,
            avg_payoff: 0.0,
            gini_payoff: 0.0,
            frozen_agents,
            flagged_pairs: 0,
            brier: None,
            ece: None,
        }
    }

    pub fn csv_header() -> &'static str {
        "epoch,total_interactions,accepted_interactions,rejected_interactions,\
         toxicity_rate,quality_gap,conditional_loss,mean_p,var_p,total_welfare,\
         avg_payoff,gini_payoff,frozen_agents,flagged_pairs,brier,ece"
    }

    pub fn csv_row(&self) -> String {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        format!(
            "{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{},{},{},{}",
            self.epoch,
            self.total_interactions,
            self.accepted_interactions,
            self.rejected_interactions,
            self.toxicity_rate,
            self.quality_gap,
            self.conditional_loss,
            self.mean_p,
            self.var_p,
            self.total_welfare,
            self.avg_payoff,
            self.gini_payoff,
            self.frozen_agents,
            self.flagged_pairs,
            opt(self.brier),
            opt(self.ece),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, InteractionId, InteractionKind, ProxyObservables};

    fn ix(n: u64, p: f64, accepted: bool) -> SoftInteraction {
        SoftInteraction {
            id: InteractionId::from_counter(n),
            epoch: 0,
            step: 0,
            initiator: AgentId::from("a"),
            counterparty: AgentId::from("b"),
            kind: InteractionKind::Collaboration,
            accepted,
            v_hat: 0.0,
            p,
            observables: ProxyObservables::neutral(),
            tau: 0.0,
            audited: false,
            audit_verdict: None,
            taxed_amount: 0.0,
            payoff_a: 1.0,
            payoff_b: 0.5,
        }
    }

    #[test]
    fn counts_partition_by_acceptance() {
        let data = vec![ix(0, 0.8, true), ix(1, 0.6, true), ix(2, 0.2, false)];
        let m = EpochMetrics::compute(3, &data, &[1.0, 2.0], 1, 0);
        assert_eq!(m.epoch, 3);
        assert_eq!(m.total_interactions, 3);
        assert_eq!(m.accepted_interactions, 2);
        assert_eq!(m.rejected_interactions, 1);
        assert!((m.total_welfare - 3.0).abs() < 1e-12);
        assert!((m.avg_payoff - 0.75).abs() < 1e-12);
        assert_eq!(m.frozen_agents, 1);
    }

    #[test]
    fn empty_epoch_is_all_zero() {
        let m = EpochMetrics::empty(7, 2);
        assert_eq!(m.epoch, 7);
        assert_eq!(m.total_interactions, 0);
        assert_eq!(m.toxicity_rate, 0.0);
        assert_eq!(m.frozen_agents, 2);
        assert!(m.brier.is_none());
    }

    #[test]
    fn csv_row_has_header_arity() {
        let m = EpochMetrics::empty(0, 0);
        let header_cols = EpochMetrics::csv_header().split(',').count();
        let row_cols = m.csv_row().split(',').count();
        assert_eq!(header_cols, row_cols);
    }

    #[test]
    fn serde_roundtrip() {
        let data = vec![ix(0, 0.8, true)];
        let m = EpochMetrics::compute(0, &data, &[1.0], 0, 0);
        let json = serde_json::to_string(&m).unwrap();
        let back: EpochMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
