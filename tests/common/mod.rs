//! Common test utilities for fanout-dl integration tests

#![allow(dead_code)]

use fanout_dl::DownloaderConfig;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// JSON body the photos endpoint returns for `id`
pub fn photo_body(id: u64) -> serde_json::Value {
    serde_json::json!({
        "albumId": (id - 1) / 50 + 1,
        "id": id,
        "title": format!("photo {id}"),
        "url": format!("https://via.placeholder.com/600/{id:06x}"),
        "thumbnailUrl": format!("https://via.placeholder.com/150/{id:06x}"),
    })
}

/// Mount `/photos/{id}` answering with `status` (and a photo body when 200)
pub async fn mount_status(server: &MockServer, id: u64, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(photo_body(id))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("GET"))
        .and(path(format!("/photos/{id}")))
        .respond_with(template)
        .expect(1)
        .mount(server)
        .await;
}

/// Downloader settings aimed at a mock server, with telemetry under `dir`
pub fn mock_config(server: &MockServer, dir: &Path, total_items: usize) -> DownloaderConfig {
    DownloaderConfig {
        base_url: server.uri(),
        total_items,
        concurrency: 3,
        request_timeout: Duration::from_secs(5),
        telemetry_interval: Duration::from_millis(25),
        telemetry_log: dir.join("logs.txt"),
        run_deadline: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}
