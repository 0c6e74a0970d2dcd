//! Periodic telemetry: samples the run's counters and appends a line per tick
//! to a local log file. Observational only, it never feeds back into flow control.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::pipeline::Admission;
use crate::types::TelemetrySnapshot;

use super::RunCounters;

/// Open the telemetry log for appending, creating it if needed.
pub(crate) async fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| Error::TelemetryLog {
            path: path.to_path_buf(),
            source,
        })
}

/// Parameters for spawning the telemetry task
pub(crate) struct TelemetryParams {
    /// Already-opened log file
    pub log: File,
    /// Path of the log, for diagnostics
    pub path: PathBuf,
    /// Sampling period
    pub interval: Duration,
    /// Counters of the current run
    pub counters: Arc<RunCounters>,
    /// Admission semaphore of the run (for the in-flight figure)
    pub admission: Admission,
    /// Stops the task; a final sample is written first
    pub cancel_token: tokio_util::sync::CancellationToken,
}

/// Take one sample of the run's state.
pub(crate) fn sample(counters: &RunCounters, admission: &Admission) -> TelemetrySnapshot {
    TelemetrySnapshot {
        timestamp: chrono::Utc::now().timestamp(),
        live_tasks: tokio::runtime::Handle::current()
            .metrics()
            .num_alive_tasks(),
        in_flight: admission.holders(),
        succeeded: counters.succeeded.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
    }
}

/// Spawn the sampler. The handle resolves to the number of lines written.
pub(crate) fn spawn_telemetry(params: TelemetryParams) -> tokio::task::JoinHandle<u64> {
    let TelemetryParams {
        mut log,
        path,
        interval,
        counters,
        admission,
        cancel_token,
    } = params;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut lines = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = sample(&counters, &admission);
                    if write_line(&mut log, &path, &snapshot).await {
                        lines += 1;
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        // Final sample so the log always ends with the closing totals
        let snapshot = sample(&counters, &admission);
        if write_line(&mut log, &path, &snapshot).await {
            lines += 1;
        }
        if let Err(e) = log.flush().await {
            tracing::error!(path = %path.display(), error = %e, "failed to flush telemetry log");
        }
        lines
    })
}

async fn write_line(log: &mut File, path: &Path, snapshot: &TelemetrySnapshot) -> bool {
    tracing::trace!(
        live_tasks = snapshot.live_tasks,
        in_flight = snapshot.in_flight,
        succeeded = snapshot.succeeded,
        "telemetry sample"
    );
    match log.write_all(snapshot.to_line().as_bytes()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to write telemetry line");
            false
        }
    }
}
