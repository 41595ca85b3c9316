//! Observable synthesis
//!
//! The sandbox knows each interaction's latent intent; what the proxy gets
//! to see is derived here. The gap between the two is the whole point:
//! cosmetic inflation lifts the apparent signals while the hidden ground
//! truth stays low, and friction counters (rework, rejections, misuse)
//! leak part of the truth back out.
//!
//! Apparent signals are modulated by the initiator's reputation, which
//! closes the loop reputation -> observables -> p -> reputation: an agent
//! whose label stream sags finds its future work discounted too.

use swarm_core::{KernelRng, ProxyObservables};

/// Chance a misrepresented interaction draws visible rejections.
const DETECTION_RATE: f64 = 0.3;

/// Inverse-transform Poisson sample; the standard small-lambda method.
pub fn poisson(rng: &mut KernelRng, lambda: f64) -> u32 {
    if lambda <= 0.0 {
        return 0;
    }
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut product = 1.0;
    loop {
        product *= rng.next_f64();
        if product <= limit {
            return k;
        }
        k += 1;
    }
}

/// Synthesize the observables for one interaction from its latent intent
/// and the initiator's current reputation.
///
/// `true_quality` in [0, 1] is the ground truth; `apparent_boost` in
/// [0, 1] inflates the surface signals without changing it. Reputation 0.5
/// is neutral; above it the apparent signals are amplified, below it
/// discounted.
pub fn observables(
    true_quality: f64,
    apparent_boost: f64,
    initiator_reputation: f64,
    rng: &mut KernelRng,
) -> ProxyObservables {
    let apparent = (true_quality + apparent_boost * (1.0 - true_quality)).clamp(0.0, 1.0);
    let modulation = 0.7 + 0.6 * initiator_reputation.clamp(0.0, 1.0);
    let apparent = (apparent * modulation).clamp(0.0, 1.0);

    let progress_noise = rng.range_f64(-0.05, 0.05);
    let task_progress_delta = (2.0 * apparent - 1.0 + progress_noise).clamp(-1.0, 1.0);

    // low-quality work reworks more; inflation cannot hide it
    let rework_count = poisson(rng, 0.2 + 0.6 * (1.0 - true_quality));

    // misrepresentation is sometimes caught at the surface
    let verifier_rejections = if apparent_boost > 0.0 && rng.chance(DETECTION_RATE) {
        1 + poisson(rng, 1.0)
    } else {
        0
    };

    let engagement_noise = rng.range_f64(-0.1, 0.1);
    let engagement_delta = ((2.0 * apparent - 1.0) * 0.8 + engagement_noise).clamp(-1.0, 1.0);

    let tool_misuse_flags = poisson(rng, apparent_boost);

    ProxyObservables {
        task_progress_delta,
        rework_count,
        verifier_rejections,
        engagement_delta,
        tool_misuse_flags,
        true_v: Some(2.0 * true_quality - 1.0),
    }
}
