//! SWARM Events - append-only event log
//!
//! All consequential kernel actions produce events. The log is strictly
//! append-only, sequence numbers start at 0 and increase by exactly one,
//! and `timestamp_logical` is a monotonic counter rather than wall-clock
//! so two identically seeded runs serialize byte-identically.
//!
//! # Invariants
//!
//! 1. `seq` is strictly monotonic within a run
//! 2. Every event is committed to the sink before `append` returns
//! 3. Replaying a persisted log yields the events in sequence order
//! 4. `to_interactions` reconstructs the resolved-interaction multiset
//!    exactly as the live run produced it

pub mod event;
pub mod log;
pub mod sink;

pub use event::{Event, EventKind};
pub use log::{to_interactions, EventLog, EventLogError};
pub use sink::{read_jsonl, EventSink, JsonlSink, MemorySink};

pub type Result<T> = std::result::Result<T, EventLogError>;
