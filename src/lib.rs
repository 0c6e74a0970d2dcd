//! # fanout-dl
//!
//! Bounded-concurrency fan-out/fan-in pipeline for tokio, plus a concurrent
//! HTTP fetch-and-aggregate workload built on top of it.
//!
//! ## Design
//!
//! - **Cancellable source** - a producer task offers items one at a time and stops
//!   as soon as the run's [`CancellationToken`](tokio_util::sync::CancellationToken) fires
//! - **Worker pool** - a fixed number of workers pull from the source, apply a transform
//!   and push results into one merged stream
//! - **Admission control** - an optional semaphore, sized independently of the pool,
//!   caps how many workers are doing the expensive part at once
//! - **Structured completion** - workers register with a completion barrier before they
//!   are spawned, and the merge stream closes only once every worker has exited
//!
//! ## Quick Start
//!
//! ```no_run
//! use fanout_dl::{Downloader, DownloaderConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = Downloader::new(DownloaderConfig {
//!         total_items: 100,
//!         concurrency: 5,
//!         workers: Some(20),
//!         ..Default::default()
//!     })?;
//!
//!     let summary = downloader.run_with_deadline(Duration::from_secs(60)).await?;
//!     println!("downloaded {} records", summary.succeeded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Photo downloader workload
pub mod downloader;
/// Error types
pub mod error;
/// Fan-out/fan-in pipeline
pub mod pipeline;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, DownloaderConfig, PipelineConfig};
pub use downloader::Downloader;
pub use error::{Error, FailureKind, FetchError, Result};
pub use pipeline::{
    Admission, AdmissionPermit, AdmissionScope, CompletionBarrier, FanOut, FanOutOptions, fan_out,
};
pub use types::{FailureCounts, Photo, RunSummary, TelemetrySnapshot};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives SIGTERM or SIGINT (Ctrl+C on
/// non-unix targets).
///
/// Returns without cancelling if the token is cancelled by someone else first,
/// or if no signal listener can be installed.
///
/// # Example
///
/// ```no_run
/// use fanout_dl::{Downloader, cancel_on_shutdown_signal};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::with_concurrency(10)?;
///     let cancel = CancellationToken::new();
///     tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
///
///     let summary = downloader.run(cancel).await?;
///     println!("{summary:?}");
///     Ok(())
/// }
/// ```
pub async fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::select! {
        received = shutdown_signal() => match received {
            Ok(signal) => {
                tracing::info!(signal, "shutdown signal received, cancelling run");
                token.cancel();
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for shutdown signals");
            }
        },
        _ = token.cancelled() => {}
    }
}

/// Resolves with the name of the first termination signal delivered.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        interrupted = tokio::signal::ctrl_c() => interrupted.map(|()| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl_c")
}
