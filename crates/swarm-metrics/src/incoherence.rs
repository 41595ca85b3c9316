//! Incoherence metrics
//!
//! Separates two failure modes with the same surface symptom: an agent can
//! be harmful because it coherently pursues a bad objective, or because
//! its decisions are noise. The index `I = D / (E + eps)`, clipped to
//! [0, 1], is high when dispersion dominates error. Replay dispersion
//! requires shadow runs; the helpers here are pure so they compose with
//! however many replays the caller ran.

const EPS: f64 = 1e-6;

/// Fraction of unordered pairs of decisions that disagree.
pub fn disagreement_rate<T: PartialEq>(actions: &[T]) -> f64 {
    let n = actions.len();
    if n < 2 {
        return 0.0;
    }
    let mut pairs = 0u64;
    let mut disagreements = 0u64;
    for i in 0..n {
        for j in (i + 1)..n {
            pairs += 1;
            if actions[i] != actions[j] {
                disagreements += 1;
            }
        }
    }
    disagreements as f64 / pairs as f64
}

/// Fraction of decisions differing from the benchmark action. 0 when no
/// benchmark exists.
pub fn error_rate<T: PartialEq>(actions: &[T], benchmark: Option<&T>) -> f64 {
    let Some(benchmark) = benchmark else {
        return 0.0;
    };
    if actions.is_empty() {
        return 0.0;
    }
    let errors = actions.iter().filter(|a| *a != benchmark).count();
    errors as f64 / actions.len() as f64
}

/// Fisher dispersion (variance-to-mean ratio) of a replay statistic.
/// 0 for degenerate inputs.
pub fn fisher_dispersion(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean.abs() < EPS {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var / mean.abs()
}

/// The incoherence index `I = D / (E + eps)`, clipped to [0, 1].
pub fn incoherence_index(disagreement: f64, error: f64) -> f64 {
    if disagreement == 0.0 && error == 0.0 {
        return 0.0;
    }
    (disagreement / (error + EPS)).clamp(0.0, 1.0)
}
