//! Soft (probabilistic) interaction metrics

use swarm_core::{PayoffConfig, SoftInteraction};

fn accepted(interactions: &[SoftInteraction]) -> impl Iterator<Item = &SoftInteraction> {
    interactions.iter().filter(|i| i.accepted)
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0u64;
    for v in values {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

/// Toxicity rate: `E[1 - p | accepted]`. 0 when nothing was accepted.
pub fn toxicity_rate(interactions: &[SoftInteraction]) -> f64 {
    mean(accepted(interactions).map(|i| 1.0 - i.p)).unwrap_or(0.0)
}

/// Unconditional toxicity: `E[1 - p]` over all interactions.
pub fn toxicity_rate_all(interactions: &[SoftInteraction]) -> f64 {
    mean(interactions.iter().map(|i| 1.0 - i.p)).unwrap_or(0.0)
}

/// Quality gap: `E[p | accepted] - E[p | rejected]`. Negative values mean
/// adverse selection; 0 when either bucket is empty.
pub fn quality_gap(interactions: &[SoftInteraction]) -> f64 {
    let acc = mean(accepted(interactions).map(|i| i.p));
    let rej = mean(interactions.iter().filter(|i| !i.accepted).map(|i| i.p));
    match (acc, rej) {
        (Some(a), Some(r)) => a - r,
        _ => 0.0,
    }
}

/// Conditional loss for the initiator: `E[pi_a | accepted] - E[pi_a]`.
pub fn conditional_loss_initiator(interactions: &[SoftInteraction]) -> f64 {
    let acc = mean(accepted(interactions).map(|i| i.payoff_a));
    let all = mean(interactions.iter().map(|i| i.payoff_a));
    match (acc, all) {
        (Some(a), Some(b)) => a - b,
        _ => 0.0,
    }
}

/// Conditional loss for the counterparty: `E[pi_b | accepted] - E[pi_b]`.
pub fn conditional_loss_counterparty(interactions: &[SoftInteraction]) -> f64 {
    let acc = mean(accepted(interactions).map(|i| i.payoff_b));
    let all = mean(interactions.iter().map(|i| i.payoff_b));
    match (acc, all) {
        (Some(a), Some(b)) => a - b,
        _ => 0.0,
    }
}

/// Spread: `(s_plus + s_minus) * (E[p] - E[p | accepted])`. Positive when
/// the market is filtering out the high-quality tail.
pub fn spread(interactions: &[SoftInteraction], payoff: &PayoffConfig) -> f64 {
    let all = mean(interactions.iter().map(|i| i.p));
    let acc = mean(accepted(interactions).map(|i| i.p));
    match (all, acc) {
        (Some(a), Some(b)) => (payoff.s_plus + payoff.s_minus) * (a - b),
        _ => 0.0,
    }
}

/// Mean soft label over all interactions.
pub fn mean_p(interactions: &[SoftInteraction]) -> f64 {
    mean(interactions.iter().map(|i| i.p)).unwrap_or(0.0)
}

/// Population variance of the soft label.
pub fn var_p(interactions: &[SoftInteraction]) -> f64 {
    let Some(mu) = mean(interactions.iter().map(|i| i.p)) else {
        return 0.0;
    };
    mean(interactions.iter().map(|i| (i.p - mu).powi(2))).unwrap_or(0.0)
}

/// Average quality `E[p]`, optionally conditioned on acceptance.
pub fn average_quality(interactions: &[SoftInteraction], accepted_only: bool) -> f64 {
    if accepted_only {
        mean(accepted(interactions).map(|i| i.p)).unwrap_or(0.0)
    } else {
        mean_p(interactions)
    }
}

/// Fraction of interactions whose label sits in the band around 0.5.
pub fn uncertain_fraction(interactions: &[SoftInteraction], band: f64) -> f64 {
    if interactions.is_empty() {
        return 0.0;
    }
    let uncertain = interactions.iter().filter(|i| i.is_uncertain(band)).count();
    uncertain as f64 / interactions.len() as f64
}

/// Sum of both parties' payoffs over accepted interactions.
pub fn total_welfare(interactions: &[SoftInteraction]) -> f64 {
    accepted(interactions).map(|i| i.payoff_a + i.payoff_b).sum()
}

/// Gini coefficient of a payoff distribution. Values are shifted to be
/// non-negative first; a degenerate (all-equal or empty) distribution
/// scores 0.
pub fn gini(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = if min < 0.0 {
        values.iter().map(|v| v - min).collect()
    } else {
        values.to_vec()
    };
    let n = shifted.len() as f64;
    let total: f64 = shifted.iter().sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let mut abs_diff_sum = 0.0;
    for a in &shifted {
        for b in &shifted {
            abs_diff_sum += (a - b).abs();
        }
    }
    abs_diff_sum / (2.0 * n * total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{AgentId, InteractionId, InteractionKind, ProxyObservables};

    fn ix(p: f64, accepted: bool, payoff_a: f64, payoff_b: f64) -> SoftInteraction {
        SoftInteraction {
            id: InteractionId::from_counter(0),
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
            payoff_a,
            payoff_b,
        }
    }

    #[test]
    fn toxicity_conditions_on_acceptance() {
        let data = vec![ix(0.9, true, 0.0, 0.0), ix(0.1, false, 0.0, 0.0)];
        assert!((toxicity_rate(&data) - 0.1).abs() < 1e-12);
        assert!((toxicity_rate_all(&data) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_set_yields_zero_everywhere() {
        let data: Vec<SoftInteraction> = vec![];
        assert_eq!(toxicity_rate(&data), 0.0);
        assert_eq!(quality_gap(&data), 0.0);
        assert_eq!(conditional_loss_initiator(&data), 0.0);
        assert_eq!(mean_p(&data), 0.0);
        assert_eq!(var_p(&data), 0.0);
        assert_eq!(total_welfare(&data), 0.0);
    }

    #[test]
    fn quality_gap_is_zero_with_one_empty_bucket() {
        let all_accepted = vec![ix(0.8, true, 0.0, 0.0)];
        assert_eq!(quality_gap(&all_accepted), 0.0);
    }

    #[test]
    fn negative_quality_gap_flags_adverse_selection() {
        let data = vec![
            ix(0.3, true, 0.0, 0.0),
            ix(0.4, true, 0.0, 0.0),
            ix(0.9, false, 0.0, 0.0),
        ];
        assert!(quality_gap(&data) < 0.0);
    }

    #[test]
    fn conditional_loss_detects_worse_than_average_acceptance() {
        let data = vec![ix(0.5, true, -1.0, 0.0), ix(0.5, false, 2.0, 0.0)];
        // accepted mean -1.0, overall mean 0.5
        assert!((conditional_loss_initiator(&data) + 1.5).abs() < 1e-12);
    }

    #[test]
    fn spread_is_positive_when_good_interactions_are_rejected() {
        let cfg = PayoffConfig::default();
        let data = vec![ix(0.2, true, 0.0, 0.0), ix(0.9, false, 0.0, 0.0)];
        assert!(spread(&data, &cfg) > 0.0);
    }

    #[test]
    fn welfare_sums_accepted_payoffs() {
        let data = vec![ix(0.5, true, 1.0, 0.5), ix(0.5, false, 9.0, 9.0)];
        assert!((total_welfare(&data) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn gini_of_equal_distribution_is_zero() {
        assert_eq!(gini(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn gini_of_concentrated_distribution_is_high() {
        let g = gini(&[0.0, 0.0, 0.0, 10.0]);
        assert!(g > 0.7, "gini was {g}");
    }

    #[test]
    fn gini_handles_negative_values() {
        let g = gini(&[-1.0, 0.0, 1.0]);
        assert!((0.0..=1.0).contains(&g));
    }

    #[test]
    fn uncertain_fraction_counts_the_band() {
        let data = vec![
            ix(0.5, true, 0.0, 0.0),
            ix(0.55, true, 0.0, 0.0),
            ix(0.95, true, 0.0, 0.0),
        ];
        assert!((uncertain_fraction(&data, 0.2) - 2.0 / 3.0).abs() < 1e-12);
    }
}
