//! SWARM Metrics - pure functions over the interaction record
//!
//! Everything here is computable from the event log and the agent ledger;
//! nothing feeds back into the simulation. Soft metrics read the
//! probabilistic labels directly: a toxicity rate of 0.2 means accepted
//! interactions carried a 20% expected chance of harm, whether or not any
//! harm was ever realized.

pub mod calibration;
pub mod epoch;
pub mod incoherence;
pub mod soft;

pub use calibration::{brier_score, expected_calibration_error};
pub use epoch::EpochMetrics;
pub use incoherence::{disagreement_rate, error_rate, fisher_dispersion, incoherence_index};
pub use soft::{
    average_quality, conditional_loss_counterparty, conditional_loss_initiator, gini, mean_p,
    quality_gap, spread, total_welfare, toxicity_rate, toxicity_rate_all, uncertain_fraction,
    var_p,
};
