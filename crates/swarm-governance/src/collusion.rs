//! Collusion detection over pairwise behavior
//!
//! Two independent branches, OR-combined:
//!
//! - **Frequency**: the ordered pair's count of positive social events
//!   (up-votes, task co-completions, accepted positive interactions)
//!   exceeds the population baseline by more than two standard deviations.
//!   The baseline excludes the candidate pair so a single dominant pair
//!   cannot drag the threshold up to itself.
//! - **Correlation**: Pearson correlation of the two agents' recent
//!   interaction-outcome series exceeds the configured threshold, with at
//!   least `MIN_SAMPLES` aligned observations.
//!
//! A pair is flagged at most once per epoch. Legitimate cooperation stays
//! below both branches: diffuse goodwill spreads its events across many
//! pairs, and ordinary outcome variance decorrelates the series.

use std::collections::{BTreeMap, VecDeque};

use swarm_core::AgentId;

/// Minimum aligned samples before either branch is consulted.
pub const MIN_SAMPLES: usize = 4;

/// Pearson correlation of two equal-length series. None when either side
/// has (numerically) zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x < 1e-12 || var_y < 1e-12 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

type Pair = (AgentId, AgentId);

#[derive(Debug, Clone)]
pub struct CollusionDetector {
    window: usize,
    rho_threshold: f64,
    /// Recent interaction outcomes per agent.
    outcomes: BTreeMap<AgentId, VecDeque<f64>>,
    /// Positive social events per ordered pair.
    pair_events: BTreeMap<Pair, u32>,
    /// Epoch a pair was last flagged; one flag per pair per epoch.
    last_flagged: BTreeMap<Pair, u64>,
}

impl CollusionDetector {
    pub fn new(window: usize, rho_threshold: f64) -> Self {
        Self {
            window,
            rho_threshold,
            outcomes: BTreeMap::new(),
            pair_events: BTreeMap::new(),
            last_flagged: BTreeMap::new(),
        }
    }

    /// Record one interaction outcome for an agent's series.
    pub fn record_outcome(&mut self, agent: &AgentId, p: f64) {
        let buf = self.outcomes.entry(agent.clone()).or_default();
        buf.push_back(p);
        while buf.len() > self.window {
            buf.pop_front();
        }
    }

    /// Record one directed social event from `a` toward `b`.
    pub fn record_social_event(&mut self, a: &AgentId, b: &AgentId, positive: bool) {
        if positive {
            let key = (a.clone(), b.clone());
            *self.pair_events.entry(key).or_insert(0) += 1;
        }
    }

    /// Frequency branch: candidate event count vs baseline of all other
    /// pairs that have any events.
    fn frequency_branch(&self, pair: &Pair) -> bool {
        let count = self.pair_events.get(pair).copied().unwrap_or(0);
        if (count as usize) < MIN_SAMPLES {
            return false;
        }
        let others: Vec<f64> = self
            .pair_events
            .iter()
            .filter(|(k, _)| *k != pair)
            .map(|(_, c)| f64::from(*c))
            .collect();
        if others.is_empty() {
            return false;
        }
        let n = others.len() as f64;
        let mean = others.iter().sum::<f64>() / n;
        let var = others.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        f64::from(count) > mean + 2.0 * var.sqrt()
    }

    /// Correlation branch: aligned outcome series of the two agents.
    fn correlation_branch(&self, a: &AgentId, b: &AgentId) -> bool {
        let (Some(xs), Some(ys)) = (self.outcomes.get(a), self.outcomes.get(b)) else {
            return false;
        };
        let len = xs.len().min(ys.len());
        if len < MIN_SAMPLES {
            return false;
        }
        let xs: Vec<f64> = xs.iter().rev().take(len).rev().copied().collect();
        let ys: Vec<f64> = ys.iter().rev().take(len).rev().copied().collect();
        matches!(pearson(&xs, &ys), Some(rho) if rho > self.rho_threshold)
    }

    /// Evaluate the ordered pair. Returns true (and records the flag) when
    /// either branch fires and the pair was not already flagged this epoch.
    pub fn evaluate(&mut self, a: &AgentId, b: &AgentId, epoch: u64) -> bool {
        let pair = (a.clone(), b.clone());
        if self.last_flagged.get(&pair) == Some(&epoch) {
            return false;
        }
        let flagged = self.frequency_branch(&pair) || self.correlation_branch(a, b);
        if flagged {
            self.last_flagged.insert(pair, epoch);
        }
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AgentId, AgentId, AgentId, AgentId) {
        (
            AgentId::from("adv_1"),
            AgentId::from("adv_2"),
            AgentId::from("honest_1"),
            AgentId::from("honest_2"),
        )
    }

    #[test]
    fn pearson_of_identical_series_is_one() {
        let xs = [0.1, 0.5, 0.9, 0.3];
        assert!((pearson(&xs, &xs).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_constant_series_is_undefined() {
        assert!(pearson(&[0.5, 0.5, 0.5], &[0.1, 0.9, 0.4]).is_none());
    }

    #[test]
    fn pearson_of_opposed_series_is_negative() {
        let xs = [0.0, 0.5, 1.0];
        let ys = [1.0, 0.5, 0.0];
        assert!((pearson(&xs, &ys).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn frequency_branch_flags_dominant_pair() {
        let (a, b, h1, h2) = ids();
        let mut det = CollusionDetector::new(20, 0.7);
        // adversarial pair: always positive
        for _ in 0..8 {
            det.record_social_event(&a, &b, true);
        }
        // honest pairs: sparse positives
        for i in 0..8 {
            det.record_social_event(&h1, &h2, i % 4 == 0);
            det.record_social_event(&h2, &h1, i % 4 == 1);
        }
        assert!(det.evaluate(&a, &b, 0));
        assert!(!det.evaluate(&h1, &h2, 0));
    }

    #[test]
    fn correlation_branch_flags_tracking_outcomes() {
        let (a, b, h1, _) = ids();
        let mut det = CollusionDetector::new(20, 0.7);
        let series = [0.2, 0.8, 0.4, 0.9, 0.1, 0.7];
        for p in series {
            det.record_outcome(&a, p);
            det.record_outcome(&b, p + 0.01);
        }
        // honest agent with independent outcomes
        for p in [0.9, 0.1, 0.8, 0.2, 0.9, 0.1] {
            det.record_outcome(&h1, p);
        }
        assert!(det.evaluate(&a, &b, 0));
        assert!(!det.evaluate(&a, &h1, 0));
    }

    #[test]
    fn flag_fires_once_per_epoch() {
        let (a, b, _, _) = ids();
        let mut det = CollusionDetector::new(20, 0.7);
        for p in [0.2, 0.8, 0.4, 0.9] {
            det.record_outcome(&a, p);
            det.record_outcome(&b, p);
        }
        assert!(det.evaluate(&a, &b, 3));
        assert!(!det.evaluate(&a, &b, 3));
        assert!(det.evaluate(&a, &b, 4));
    }

    #[test]
    fn sparse_pairs_are_ignored() {
        let (a, b, _, _) = ids();
        let mut det = CollusionDetector::new(20, 0.7);
        det.record_social_event(&a, &b, true);
        det.record_outcome(&a, 0.9);
        det.record_outcome(&b, 0.9);
        assert!(!det.evaluate(&a, &b, 0));
    }
}
