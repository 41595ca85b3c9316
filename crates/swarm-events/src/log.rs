//! The append-only log and its replay helpers

use serde_json::Value;
use thiserror::Error;

use swarm_core::SoftInteraction;

use crate::event::{Event, EventKind};
use crate::sink::EventSink;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("sink write failed: {message}")]
    Sink { message: String },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("malformed {kind} payload at seq {seq}: {message}")]
    MalformedPayload {
        kind: &'static str,
        seq: u64,
        message: String,
    },
}

/// Append-only event log with an optional durable sink.
pub struct EventLog {
    events: Vec<Event>,
    sink: Option<Box<dyn EventSink>>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            sink: None,
            next_seq: 0,
        }
    }

    pub fn with_sink(sink: Box<dyn EventSink>) -> Self {
        Self {
            events: Vec::new(),
            sink: Some(sink),
            next_seq: 0,
        }
    }

    /// Append one event. The sequence number and logical timestamp are
    /// assigned here; the event is committed to the sink before control
    /// returns, so a crash never leaves a half-written record behind.
    pub fn append(
        &mut self,
        epoch: u64,
        step: u64,
        kind: EventKind,
        payload: Value,
    ) -> Result<&Event, EventLogError> {
        let event = Event {
            seq: self.next_seq,
            timestamp_logical: self.next_seq,
            epoch,
            step,
            kind,
            payload,
        };
        if let Some(sink) = self.sink.as_mut() {
            let line = serde_json::to_string(&event)?;
            sink.commit(&line)?;
        }
        self.next_seq += 1;
        self.events.push(event);
        Ok(self.events.last().expect("just pushed"))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Replay iterator, strictly in sequence order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one kind, in sequence order.
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Count of events of one kind.
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.of_kind(kind).count()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconstruct the resolved-interaction multiset from a replayed stream.
///
/// The contract: every `interaction_resolved` event embeds the full
/// interaction record under the `interaction` payload key, so replay
/// recovers exactly what the live run resolved.
pub fn to_interactions(events: &[Event]) -> Result<Vec<SoftInteraction>, EventLogError> {
    let mut out = Vec::new();
    for event in events {
        if event.kind != EventKind::InteractionResolved {
            continue;
        }
        let value = event.payload.get("interaction").ok_or_else(|| {
            EventLogError::MalformedPayload {
                kind: "interaction_resolved",
                seq: event.seq,
                message: "missing `interaction` key".to_string(),
            }
        })?;
        let interaction: SoftInteraction =
            serde_json::from_value(value.clone()).map_err(|e| EventLogError::MalformedPayload {
                kind: "interaction_resolved",
                seq: event.seq,
                message: e.to_string(),
            })?;
        out.push(interaction);
    }
    Ok(out)
}
