//! SWARM Orchestrator - the kernel's outer loop
//!
//! Owns the environment, the policies, the governance engine, the payoff
//! engine, the event log and the single seeded RNG. Per epoch it resets
//! rate limits, seeds the task pool, visits every agent per step in a
//! deterministic order, resolves interactions, applies governance rulings
//! and emits one `EpochMetrics` record.
//!
//! # Determinism
//!
//! Two runs with the same `ScenarioConfig` and seed produce byte-identical
//! event streams. Everything stochastic draws from the one `KernelRng` in
//! visitation order; collections iterate in sorted or registration order;
//! wall-clock only ever reaches the run manifest.

pub mod manifest;
pub mod orchestrator;
pub mod schedule;
pub mod synth;

pub use manifest::{RunManifest, RunStatus};
pub use orchestrator::{Orchestrator, RunError};
pub use schedule::visitation;
