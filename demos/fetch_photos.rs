//! Fetch photo records concurrently and print a run summary.
//!
//! ```bash
//! cargo run --example fetch_photos                 # built-in defaults
//! cargo run --example fetch_photos -- config.json  # settings from a file
//! RUST_LOG=fanout_dl=debug cargo run --example fetch_photos
//! ```
//!
//! Ctrl+C cancels the run; the summary is still printed.

use fanout_dl::{Config, Downloader, cancel_on_shutdown_signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fanout_dl=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    // Loading and construction both validate the settings.
    let downloader = Downloader::new(config.downloader)?;
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let summary = downloader.run(cancel).await?;

    println!("requested:  {}", summary.requested);
    println!("downloaded: {}", summary.succeeded);
    println!(
        "failed:     {} (transport {}, status {}, decode {}, invalid {})",
        summary.failed.total(),
        summary.failed.transport,
        summary.failed.status,
        summary.failed.decode,
        summary.failed.invalid_request
    );
    println!("cancelled:  {}", summary.cancelled);
    println!("elapsed:    {:.2?}", summary.elapsed);
    Ok(())
}
