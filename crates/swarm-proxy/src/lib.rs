//! SWARM Proxy - observable signals to calibrated soft labels
//!
//! Pure and stateless. The pipeline is
//!
//! ```text
//! ProxyObservables -> features -> v_hat in [-1, 1] -> p = sigma(k * v_hat)
//! ```
//!
//! Count observables (rework, rejections, misuse flags) are mapped through
//! the bounded decay `1 - exp(-c * n)` so a runaway counter saturates at a
//! unit penalty instead of swamping the weighted sum. The decay constant
//! and the weights are configuration; their exact forms are part of the
//! cross-run reproducibility contract.

use serde::{Deserialize, Serialize};
use swarm_core::{ProxyConfig, ProxyObservables};

/// Bounded features derived from one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxyFeatures {
    pub progress: f64,
    pub rework: f64,
    pub rejections: f64,
    pub engagement: f64,
    pub misuse: f64,
}

/// Map a count to a bounded penalty in [0, 1).
fn count_penalty(count: u32, decay: f64) -> f64 {
    1.0 - (-decay * f64::from(count)).exp()
}

/// Extract bounded features from raw observables.
pub fn features(obs: &ProxyObservables, cfg: &ProxyConfig) -> ProxyFeatures {
    ProxyFeatures {
        progress: obs.task_progress_delta.clamp(-1.0, 1.0),
        rework: count_penalty(obs.rework_count, cfg.count_decay),
        rejections: count_penalty(obs.verifier_rejections, cfg.count_decay),
        engagement: obs.engagement_delta.clamp(-1.0, 1.0),
        misuse: count_penalty(obs.tool_misuse_flags, cfg.count_decay),
    }
}

/// Raw proxy score: weighted combination clamped to [-1, 1].
/// Friction features (rework, rejections, misuse) contribute negatively.
pub fn v_hat(obs: &ProxyObservables, cfg: &ProxyConfig) -> f64 {
    let f = features(obs, cfg);
    let score = cfg.w_progress * f.progress - cfg.w_rework * f.rework
        - cfg.w_rejections * f.rejections
        + cfg.w_engagement * f.engagement
        - cfg.w_misuse * f.misuse;
    score.clamp(-1.0, 1.0)
}

/// Calibrated soft label: `p = 1 / (1 + exp(-k * v))`.
pub fn soft_label(v: f64, k: f64) -> f64 {
    1.0 / (1.0 + (-k * v).exp())
}

/// Full pipeline: observables to `(v_hat, p)`.
pub fn score(obs: &ProxyObservables, cfg: &ProxyConfig) -> (f64, f64) {
    let v = v_hat(obs, cfg);
    (v, soft_label(v, cfg.k))
}

/// Inverse sigmoid, for calibration. The input is clamped away from the
/// poles so the logit stays finite.
pub fn v_hat_from_p(p: f64, k: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    (p / (1.0 - p)).ln() / k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ProxyConfig {
        ProxyConfig::default()
    }

    fn obs(progress: f64, rework: u32, rejections: u32, engagement: f64) -> ProxyObservables {
        ProxyObservables {
            task_progress_delta: progress,
            rework_count: rework,
            verifier_rejections: rejections,
            engagement_delta: engagement,
            tool_misuse_flags: 0,
            true_v: None,
        }
    }

    #[test]
    fn neutral_observables_score_neutral() {
        let (v, p) = score(&ProxyObservables::neutral(), &cfg());
        assert_eq!(v, 0.0);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn positive_signals_raise_p() {
        let (_, p) = score(&obs(1.0, 0, 0, 1.0), &cfg());
        assert!(p > 0.8);
    }

    #[test]
    fn friction_lowers_p() {
        let clean = score(&obs(0.5, 0, 0, 0.0), &cfg()).1;
        let frictioned = score(&obs(0.5, 4, 3, 0.0), &cfg()).1;
        assert!(frictioned < clean);
    }

    #[test]
    fn count_penalty_is_bounded() {
        let c = cfg();
        let worst = obs(-1.0, u32::MAX, u32::MAX, -1.0);
        let (v, p) = score(&worst, &c);
        assert!(v >= -1.0);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn v_hat_is_clamped() {
        let mut heavy = cfg();
        heavy.w_progress = 5.0;
        let v = v_hat(&obs(1.0, 0, 0, 1.0), &heavy);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn sigmoid_inverse_roundtrips() {
        let k = 3.0;
        for v in [-1.0, -0.5, -0.1, 0.0, 0.3, 0.9, 1.0] {
            let p = soft_label(v, k);
            let back = v_hat_from_p(p, k);
            assert!((back - v).abs() < 1e-9, "v={v} back={back}");
        }
    }

    #[test]
    fn large_k_approaches_step_function() {
        let k = 1e6;
        assert!(soft_label(0.01, k) > 0.999);
        assert!(soft_label(-0.01, k) < 0.001);
        assert!((soft_label(0.0, k) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn scoring_is_deterministic() {
        let o = obs(0.3, 2, 1, -0.2);
        let c = cfg();
        let (v1, p1) = score(&o, &c);
        let (v2, p2) = score(&o, &c);
        assert_eq!(v1.to_bits(), v2.to_bits());
        assert_eq!(p1.to_bits(), p2.to_bits());
    }
}
