//! Event sinks
//!
//! A sink receives each event as one serialized JSON line and must commit
//! it durably before returning; the log guarantees no partial writes reach
//! a reader.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::event::Event;
use crate::log::EventLogError;

pub trait EventSink: Send {
    fn commit(&mut self, line: &str) -> Result<(), EventLogError>;
}

/// Line-delimited JSON file sink. Each commit writes one line and flushes.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        let file = File::create(path.as_ref()).map_err(|e| EventLogError::Sink {
            message: e.to_string(),
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for JsonlSink {
    fn commit(&mut self, line: &str) -> Result<(), EventLogError> {
        let io_err = |e: std::io::Error| EventLogError::Sink {
            message: e.to_string(),
        };
        self.writer.write_all(line.as_bytes()).map_err(io_err)?;
        self.writer.write_all(b"\n").map_err(io_err)?;
        self.writer.flush().map_err(io_err)
    }
}

/// In-memory sink for tests and byte-level determinism checks.
#[derive(Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl EventSink for MemorySink {
    fn commit(&mut self, line: &str) -> Result<(), EventLogError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Load a persisted JSONL event stream back into memory, in order.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Event>, EventLogError> {
    let file = File::open(path.as_ref()).map_err(|e| EventLogError::Sink {
        message: e.to_string(),
    })?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| EventLogError::Sink {
            message: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)?;
        events.push(event);
    }
    Ok(events)
}
