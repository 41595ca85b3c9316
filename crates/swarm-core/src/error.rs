//! Kernel error taxonomy
//!
//! Three tiers with different propagation rules:
//!
//! - [`ConfigError`] is fatal at load; the orchestrator refuses to start.
//! - [`StateError`] is fatal mid-run; the orchestrator emits a crash event
//!   and aborts with a clean log terminator.
//! - [`ActionError`] is transient; the orchestrator logs it and converts
//!   the offending action to a pass. It never unwinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scenario or parameter validation failure (fatal at load).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid payoff config: {field} = {value} ({expected})")]
    InvalidPayoffConfig {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid governance config: {field} = {value} ({expected})")]
    InvalidGovernanceConfig {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid proxy config: {field} = {value} ({expected})")]
    InvalidProxyConfig {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid scenario: {message}")]
    InvalidScenario { message: String },

    #[error("unknown config field: {field}")]
    UnknownField { field: String },
}

/// Invariant violation discovered mid-run (fatal).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("agent not found: {agent}")]
    AgentNotFound { agent: String },

    #[error("agent already registered: {agent}")]
    DuplicateAgent { agent: String },

    #[error("negative stake for {agent}: {stake}")]
    NegativeStake { agent: String, stake: f64 },

    #[error("non-finite value in {context}: {value}")]
    NonFinite { context: String, value: f64 },

    #[error("event log write failed: {message}")]
    SinkFailed { message: String },
}

/// Transient, per-action failure. Logged and converted to a pass.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ActionError {
    #[error("rate limited: {action} quota {quota} exhausted")]
    RateLimited { action: String, quota: u32 },

    #[error("agent is frozen until epoch {until}")]
    AgentFrozen { until: u64 },

    #[error("agent is quarantined")]
    AgentQuarantined,

    #[error("stake {stake} below requirement {required}")]
    InsufficientStake { stake: f64, required: f64 },

    #[error("unknown task: {task}")]
    UnknownTask { task: String },

    #[error("unknown post: {post}")]
    UnknownPost { post: String },

    #[error("unknown interaction: {interaction}")]
    UnknownInteraction { interaction: String },

    #[error("task {task} already claimed")]
    TaskAlreadyClaimed { task: String },

    #[error("task {task} not claimed by {agent}")]
    TaskNotClaimed { task: String, agent: String },

    #[error("agent cannot interact with itself")]
    SelfInteraction,

    #[error("counterparty not found: {agent}")]
    UnknownCounterparty { agent: String },
}

/// External-proxy delegation failure (local to the proxied agent call).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyAgentError {
    #[error("proxy call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("proxy returned a malformed response: {message}")]
    Malformed { message: String },

    #[error("proxy worker disconnected")]
    Disconnected,
}
