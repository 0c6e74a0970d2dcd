//! Photo downloader: a concrete workload built on the fan-out pipeline.
//!
//! A run is organized as:
//! - [`fetch`] - the per-item transform (GET + status check + JSON decode)
//! - [`telemetry`] - the periodic sampler writing to the telemetry log
//! - this module - source of request targets, pipeline wiring, and the
//!   terminal aggregation loop producing a [`RunSummary`]

mod fetch;
mod telemetry;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DownloaderConfig;
use crate::error::{FetchError, Result};
use crate::pipeline::{Admission, FanOutOptions, fan_out, source};
use crate::types::{FailureCounts, Photo, RunSummary};

use telemetry::{TelemetryParams, spawn_telemetry};

/// Counters owned by a single run and shared with its telemetry task
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
}

/// Concurrent fetch-and-aggregate workload
///
/// Requests `total_items` records through a pool of workers whose concurrent
/// requests are capped by an admission semaphore of `concurrency` slots.
#[derive(Clone)]
pub struct Downloader {
    config: Arc<DownloaderConfig>,
    client: reqwest::Client,
    admission: Admission,
}

impl Downloader {
    /// Create a downloader from a validated configuration
    pub fn new(config: DownloaderConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().build()?;
        let admission = Admission::new(config.concurrency);
        Ok(Self {
            config: Arc::new(config),
            client,
            admission,
        })
    }

    /// Default configuration with `concurrency` admission slots (and as many workers)
    pub fn with_concurrency(concurrency: usize) -> Result<Self> {
        Self::new(DownloaderConfig {
            concurrency,
            ..Default::default()
        })
    }

    /// Active configuration
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Admission semaphore shared by this downloader's runs
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Lazy stream of request targets, `{base_url}/photos/1` onwards.
    pub fn request_targets(&self, cancel: CancellationToken) -> mpsc::Receiver<String> {
        let base_url = self.config.base_url.clone();
        source::generate_with(cancel, self.config.total_items, move |i| {
            fetch::photo_url(&base_url, i)
        })
    }

    /// Run with a fresh root cancellation token that fires after `deadline`.
    pub async fn run_with_deadline(&self, deadline: Duration) -> Result<RunSummary> {
        let cancel = CancellationToken::new();
        let timer = spawn_deadline(cancel.clone(), deadline);
        let summary = self.run(cancel).await;
        timer.abort();
        summary
    }

    /// Perform a full run and wait until the merge stream closes.
    ///
    /// The run ends when every target has been fetched, when `cancel` fires,
    /// or when the configured `run_deadline` expires, whichever comes first.
    /// Per-item failures are logged and counted, never retried, and never
    /// end the run.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let run_token = cancel.child_token();
        // Dropping this future mid-run must still stop the workers and side tasks.
        let _run_guard = run_token.clone().drop_guard();

        // Opened before any work starts so a bad path fails the run up front.
        let log = telemetry::open_log(&self.config.telemetry_log).await?;
        let deadline = self
            .config
            .run_deadline
            .map(|d| spawn_deadline(run_token.clone(), d));
        let counters = Arc::new(RunCounters::default());
        let telemetry_token = run_token.child_token();
        let telemetry_task = spawn_telemetry(TelemetryParams {
            log,
            path: self.config.telemetry_log.clone(),
            interval: self.config.telemetry_interval,
            counters: Arc::clone(&counters),
            admission: self.admission.clone(),
            cancel_token: telemetry_token.clone(),
        });

        tracing::info!(
            total = self.config.total_items,
            workers = self.config.worker_count(),
            concurrency = self.admission.capacity(),
            scope = ?self.config.admission_scope,
            "starting download run"
        );

        let pipeline = self.config.pipeline();
        let options = FanOutOptions::new(pipeline.workers)
            .with_admission(self.admission.clone())
            .with_scope(pipeline.admission_scope)
            .with_output_capacity(pipeline.output_capacity);
        let mut results = fan_out(
            run_token.clone(),
            self.request_targets(run_token.clone()),
            options,
            self.transform(run_token.clone()),
        )
        .into_stream();

        let mut succeeded = 0u64;
        let mut failed = FailureCounts::default();
        while let Some(result) = results.next().await {
            match result {
                Ok(photo) => {
                    succeeded += 1;
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(id = photo.id, thumbnail = %photo.thumbnail_url, "received photo");
                }
                Err(e) => {
                    failed.record(e.kind());
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(url = %e.url(), error = %e, "fetch failed");
                }
            }
        }

        let cancelled = run_token.is_cancelled();
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        telemetry_token.cancel();
        let lines = telemetry_task.await?;

        let summary = RunSummary {
            requested: self.config.total_items,
            succeeded,
            failed,
            cancelled,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed.total(),
            cancelled = summary.cancelled,
            telemetry_lines = lines,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "download run finished"
        );
        Ok(summary)
    }

    /// The transform handed to the worker pool
    fn transform(
        &self,
        cancel: CancellationToken,
    ) -> impl Fn(String) -> futures::future::BoxFuture<'static, std::result::Result<Photo, FetchError>>
    + Send
    + Sync
    + 'static {
        let client = self.client.clone();
        let timeout = self.config.request_timeout;
        move |target: String| {
            let client = client.clone();
            let cancel = cancel.clone();
            Box::pin(async move { fetch::fetch_photo(&client, &target, timeout, &cancel).await })
        }
    }
}

/// Cancel `token` once `deadline` has elapsed, unless it is cancelled first.
fn spawn_deadline(token: CancellationToken, deadline: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(deadline_secs = deadline.as_secs_f64(), "run deadline reached, cancelling");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
