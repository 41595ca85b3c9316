//! SWARM Governance - the levers that shape agent incentives
//!
//! The engine is stateful: it keeps per-agent toxicity windows, per-pair
//! collusion statistics and the per-epoch soft labels that feed reputation
//! updates. Per resolved interaction it evaluates its levers in a fixed
//! contract order:
//!
//! ```text
//! tax -> audit -> circuit breaker -> stake check -> collusion update
//! ```
//!
//! The engine never mutates the environment. It returns rulings; the
//! orchestrator applies them through the environment's transactions so all
//! state changes stay in one place.

pub mod breaker;
pub mod collusion;
pub mod engine;
pub mod ruling;

pub use breaker::CircuitBreaker;
pub use collusion::{pearson, CollusionDetector};
pub use engine::GovernanceEngine;
pub use ruling::{EpochEndRuling, EpochStartRuling, InteractionRuling};
