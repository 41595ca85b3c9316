//! Event record and kind vocabulary

use serde::{Deserialize, Serialize};

/// Every event type the kernel emits. Closed set; bridges attach their
/// specifics inside the payload of an existing kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentRegistered,
    ActionEmitted,
    InteractionProposed,
    InteractionResolved,
    InteractionAbandoned,
    AuditExecuted,
    AgentFrozen,
    AgentUnfrozen,
    AgentQuarantined,
    AgentSkipped,
    FrozenActionDropped,
    RateLimited,
    StakeSlashed,
    CollusionFlagged,
    EpochMetrics,
    RunCancelled,
    RunCrashed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // reuse the serde snake_case name
        let s = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// One log record. `timestamp_logical` is derived from the sequence
/// counter; wall-clock never appears in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp_logical: u64,
    pub epoch: u64,
    pub step: u64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}
