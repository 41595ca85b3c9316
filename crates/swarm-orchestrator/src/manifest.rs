//! Run manifest: the only place wall-clock time is allowed

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Crashed,
}

/// Written to `manifest.json` in the run directory at run end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub scenario_id: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub n_epochs_completed: u64,
    pub final_status: RunStatus,
}

impl RunManifest {
    pub fn begin(scenario_id: impl Into<String>, seed: u64) -> Self {
        let started_at = Utc::now();
        let run_id = format!(
            "run_{}_{}_{}",
            started_at.format("%Y%m%d_%H%M%S"),
            seed,
            &Uuid::new_v4().to_string()[..8]
        );
        Self {
            run_id,
            scenario_id: scenario_id.into(),
            seed,
            started_at,
            finished_at: None,
            n_epochs_completed: 0,
            final_status: RunStatus::Completed,
        }
    }

    pub fn finish(&mut self, status: RunStatus, epochs_completed: u64) {
        self.final_status = status;
        self.n_epochs_completed = epochs_completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}
