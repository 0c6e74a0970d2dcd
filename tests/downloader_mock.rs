//! Downloader runs through the public API against a local mock server.

mod common;

use common::{mock_config, mount_status, photo_body};
use fanout_dl::{AdmissionScope, Downloader, DownloaderConfig};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

#[tokio::test]
async fn one_failing_endpoint_leaves_two_successes() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_status(&server, 1, 200).await;
    mount_status(&server, 2, 500).await;
    mount_status(&server, 3, 200).await;

    let downloader = Downloader::new(mock_config(&server, dir.path(), 3)).unwrap();
    let summary = downloader.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.status, 1);
    assert!(!summary.cancelled);
    // `expect(1)` on every mock is verified when the server drops: no retries.
}

#[tokio::test]
async fn per_worker_scope_completes_every_item() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    for id in 1..=8 {
        mount_status(&server, id, 200).await;
    }

    let config = DownloaderConfig {
        concurrency: 2,
        workers: Some(6),
        admission_scope: AdmissionScope::PerWorker,
        ..mock_config(&server, dir.path(), 8)
    };
    let downloader = Downloader::new(config).unwrap();
    let summary = downloader.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.succeeded, 8);
    assert_eq!(downloader.admission().holders(), 0);
    assert!(downloader.admission().peak_holders() <= 2);
}

#[tokio::test]
async fn run_with_deadline_stops_slow_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(photo_body(1))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let config = DownloaderConfig {
        run_deadline: None,
        ..mock_config(&server, dir.path(), 50)
    };
    let downloader = Downloader::new(config).unwrap();

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        downloader.run_with_deadline(Duration::from_millis(500)),
    )
    .await
    .expect("deadline must end the run")
    .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 0);
    assert!(summary.completed() <= 50);
}
