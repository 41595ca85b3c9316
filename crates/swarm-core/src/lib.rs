//! SWARM Core - Canonical types for the simulation kernel
//!
//! This crate contains the foundational types shared by every kernel
//! component, with zero dependencies on other swarm crates:
//!
//! - Identity types (AgentId, InteractionId, TaskId, PostId)
//! - The action vocabulary agents emit and its typed failure reasons
//! - Soft interactions and their proxy observables
//! - Configuration surfaces (scenario, payoff, proxy, governance, rate limits)
//! - The seeded RNG service every stochastic decision draws from
//!
//! # Architectural Invariants
//!
//! 1. All randomness flows through a single owned [`KernelRng`] handle
//! 2. Interaction and event identifiers are counter-derived so replayed
//!    runs serialize byte-identically
//! 3. Configuration is validated once on entry; the kernel never sees an
//!    out-of-range parameter
//! 4. Transient failures are values (`ActionError`), never panics

pub mod action;
pub mod config;
pub mod error;
pub mod ids;
pub mod interaction;
pub mod rng;

pub use action::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use interaction::*;
pub use rng::*;

/// Version of the kernel type schema.
pub const KERNEL_SCHEMA_VERSION: &str = "0.1.0";
