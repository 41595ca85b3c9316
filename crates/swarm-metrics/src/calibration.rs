//! Calibration metrics against hard labels
//!
//! Hard labels exist only when ground truth is known (sandbox mode); both
//! metrics return None when no interaction carries one.

use swarm_core::SoftInteraction;

const ECE_BINS: usize = 10;

/// The hard label for an interaction, when ground truth is available:
/// beneficial iff the true proxy score is positive.
fn hard_label(interaction: &SoftInteraction) -> Option<f64> {
    interaction
        .observables
        .true_v
        .map(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Brier score: `mean((p - v)^2)` over interactions with a hard label.
pub fn brier_score(interactions: &[SoftInteraction]) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0u64;
    for i in interactions {
        if let Some(v) = hard_label(i) {
            sum += (i.p - v).powi(2);
            n += 1;
        }
    }
    (n > 0).then(|| sum / n as f64)
}

/// Expected calibration error over equal-width bins of p.
pub fn expected_calibration_error(interactions: &[SoftInteraction]) -> Option<f64> {
    let labeled: Vec<(f64, f64)> = interactions
        .iter()
        .filter_map(|i| hard_label(i).map(|v| (i.p, v)))
        .collect();
    if labeled.is_empty() {
        return None;
    }

    let mut bin_sum_p = [0.0; ECE_BINS];
    let mut bin_sum_v = [0.0; ECE_BINS];
    let mut bin_count = [0u64; ECE_BINS];
    for (p, v) in &labeled {
        let idx = ((p * ECE_BINS as f64) as usize).min(ECE_BINS - 1);
        bin_sum_p[idx] += p;
        bin_sum_v[idx] += v;
        bin_count[idx] += 1;
    }

    let total = labeled.len() as f64;
    let mut ece = 0.0;
    for b in 0..ECE_BINS {
        if bin_count[b] == 0 {
            continue;
        }
        let n = bin_count[b] as f64;
        let avg_p = bin_sum_p[b] / n;
        let avg_v = bin_sum_v[b] / n;
        ece += (n / total) * (avg_p - avg_v).abs();
    }
    Some(ece)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, InteractionId, InteractionKind, ProxyObservables};

    fn ix(p: f64, true_v: Option<f64>) -> SoftInteraction {
        let mut obs = ProxyObservables::neutral();
        obs.true_v = true_v;
        SoftInteraction {
            id: InteractionId::from_counter(0),
            epoch: 0,
            step: 0,
            initiator: AgentId::from("a"),
            counterparty: AgentId::from("b"),
            kind: InteractionKind::Collaboration,
            accepted: true,
            v_hat: 0.0,
            p,
            observables: obs,
            tau: 0.0,
            audited: false,
            audit_verdict: None,
            taxed_amount: 0.0,
            payoff_a: 0.0,
            payoff_b: 0.0,
        }
    }

    #[test]
    fn no_ground_truth_means_no_score() {
        let data = vec![ix(0.5, None)];
        assert!(brier_score(&data).is_none());
        assert!(expected_calibration_error(&data).is_none());
    }

    #[test]
    fn perfect_confident_predictions_score_zero() {
        let data = vec![ix(1.0, Some(0.9)), ix(0.0, Some(-0.9))];
        assert!(brier_score(&data).unwrap() < 1e-12);
        assert!(expected_calibration_error(&data).unwrap() < 1e-12);
    }

    #[test]
    fn confidently_wrong_predictions_score_one() {
        let data = vec![ix(1.0, Some(-0.9)), ix(0.0, Some(0.9))];
        assert!((brier_score(&data).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn brier_matches_hand_computation() {
        // p=0.8 vs label 1, p=0.3 vs label 0
        let data = vec![ix(0.8, Some(0.5)), ix(0.3, Some(-0.5))];
        let expected = ((0.8f64 - 1.0).powi(2) + (0.3f64 - 0.0).powi(2)) / 2.0;
        assert!((brier_score(&data).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn ece_is_bounded() {
        let data: Vec<SoftInteraction> = (0..50)
            .map(|i| {
                let p = f64::from(i) / 50.0;
                ix(p, Some(if i % 2 == 0 { 0.5 } else { -0.5 }))
            })
            .collect();
        let ece = expected_calibration_error(&data).unwrap();
        assert!((0.0..=1.0).contains(&ece));
    }
}
