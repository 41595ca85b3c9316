//! SWARM Env - the mutable world the kernel simulates
//!
//! `EnvState` owns the agent ledger, the feed, the task pool, the
//! pending-interaction table and the per-epoch rate-limit counters. All
//! mutations go through named transactions that either fully apply or
//! return a typed reason and leave state untouched.
//!
//! # Invariants
//!
//! 1. Reputation, resources and stake change only through these
//!    transactions; nothing else holds `&mut` access
//! 2. Stake never goes negative
//! 3. Rate limits refuse with `RateLimited` instead of silently dropping

pub mod agent;
pub mod state;
pub mod world;

pub use agent::AgentState;
pub use state::{EnvState, PendingInteraction, RateCounters};
pub use world::{Post, Submission, Task};
