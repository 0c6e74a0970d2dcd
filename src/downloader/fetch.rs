//! The per-item transform: GET one record and decode it.

use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::types::Photo;

/// Build the request target for the `index`-th item (zero based; records are numbered from 1).
pub(crate) fn photo_url(base_url: &str, index: usize) -> String {
    format!("{}/photos/{}", base_url.trim_end_matches('/'), index + 1)
}

/// Fetch and decode a single photo record.
///
/// Every failure is returned as a typed [`FetchError`]; nothing is retried.
/// `timeout` bounds the whole request including the body, and `cancel` aborts
/// the request early, which surfaces as a transport failure.
pub(crate) async fn fetch_photo(
    client: &reqwest::Client,
    target: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Photo, FetchError> {
    let url = url::Url::parse(target).map_err(|e| FetchError::InvalidRequest {
        url: target.to_string(),
        reason: e.to_string(),
    })?;

    tracing::debug!(url = %url, "fetching");
    let request = client.get(url).timeout(timeout);

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled(target)),
        response = request.send() => response.map_err(|e| FetchError::transport(target, &e))?,
    };

    let status = response.status();
    tracing::trace!(url = %target, status = status.as_u16(), "received status");
    if status != StatusCode::OK {
        return Err(FetchError::Status {
            url: target.to_string(),
            status: status.as_u16(),
        });
    }

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled(target)),
        body = response.bytes() => body.map_err(|e| FetchError::transport(target, &e))?,
    };

    serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
        url: target.to_string(),
        source,
    })
}

fn cancelled(target: &str) -> FetchError {
    FetchError::Transport {
        url: target.to_string(),
        reason: "run cancelled".to_string(),
        timed_out: false,
    }
}
