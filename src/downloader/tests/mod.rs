//! Downloader tests against a local mock HTTP server.

use super::*;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// JSON body for photo `id`
fn photo_body(id: u64) -> serde_json::Value {
    serde_json::json!({
        "albumId": 1,
        "id": id,
        "title": format!("photo {id}"),
        "url": format!("https://via.placeholder.com/600/{id}"),
        "thumbnailUrl": format!("https://via.placeholder.com/150/{id}"),
    })
}

/// Mount a 200 response for `/photos/{id}`
async fn mount_photo(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/photos/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(photo_body(id)))
        .mount(server)
        .await;
}

/// Config pointed at `server`, logging telemetry into `dir`
fn test_config(server: &MockServer, dir: &Path, total_items: usize) -> DownloaderConfig {
    DownloaderConfig {
        base_url: server.uri(),
        total_items,
        concurrency: 2,
        workers: None,
        request_timeout: Duration::from_secs(5),
        telemetry_interval: Duration::from_millis(20),
        telemetry_log: dir.join("logs.txt"),
        run_deadline: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}
