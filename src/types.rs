//! Core types: decoded records, telemetry samples and run summaries

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One record from the photos endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    /// Album the photo belongs to
    pub album_id: u64,
    /// Photo id
    pub id: u64,
    /// Title
    pub title: String,
    /// Full-size image URL
    pub url: String,
    /// Thumbnail image URL
    pub thumbnail_url: String,
}

/// Per-kind failure counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    /// Request could not be built
    pub invalid_request: u64,
    /// Connection failure, timeout or cancellation
    pub transport: u64,
    /// Non-200 status
    pub status: u64,
    /// Undecodable body
    pub decode: u64,
}

impl FailureCounts {
    /// Count one failure of `kind`
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::InvalidRequest => self.invalid_request += 1,
            FailureKind::Transport => self.transport += 1,
            FailureKind::Status => self.status += 1,
            FailureKind::Decode => self.decode += 1,
        }
    }

    /// Sum over all kinds
    pub fn total(&self) -> u64 {
        self.invalid_request + self.transport + self.status + self.decode
    }
}

/// A single telemetry sample. Observational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Unix timestamp (seconds) of the sample
    pub timestamp: i64,
    /// Tasks alive on the runtime
    pub live_tasks: usize,
    /// Admission slots currently held
    pub in_flight: usize,
    /// Successful results so far
    pub succeeded: u64,
    /// Failed results so far
    pub failed: u64,
}

impl TelemetrySnapshot {
    /// Free-text log line, newline terminated
    pub fn to_line(&self) -> String {
        format!(
            "[{}] tasks: {} in_flight: {} downloaded: {} failed: {}\n",
            self.timestamp, self.live_tasks, self.in_flight, self.succeeded, self.failed
        )
    }
}

/// Outcome of a downloader run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items the source was asked to produce
    pub requested: usize,
    /// Successful results received
    pub succeeded: u64,
    /// Failed results received
    pub failed: FailureCounts,
    /// The run was cancelled (deadline or external signal) before it finished
    pub cancelled: bool,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Results received in total
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed.total()
    }
}
