//! Test utilities for the relay.
//!
//! Helpers here build a full in-process application against a wiremock stub of
//! the fal.ai queue API, so handler tests exercise the real router, state, and
//! reconstruction client.

use crate::config::{Config, FalConfig};
use crate::reconstruction::{FalClient, Reconstruct};
use crate::{AppState, build_router};
use axum_test::TestServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a config pointed at a stubbed queue URL, with fast polling.
pub fn test_config(queue_url: &str, api_key: Option<&str>) -> Config {
    Config {
        fal: FalConfig {
            api_key: api_key.map(str::to_string),
            queue_url: Url::parse(queue_url).expect("mock server URI is a valid URL"),
            model: "fal-ai/triposr".to_string(),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(500),
        },
        ..Config::default()
    }
}

/// Spin up the full application router as an in-process test server.
pub fn create_test_app(config: Config) -> TestServer {
    let reconstruction: Arc<dyn Reconstruct> = Arc::new(FalClient::new(&config.fal));

    let state = AppState::builder().config(config).reconstruction(reconstruction).build();

    let router = build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Mount submit, status, and result mocks for a job that completes with `result`.
pub async fn stub_completed_job(server: &MockServer, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/fal-ai/triposr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "req-1",
            "status_url": format!("{}/requests/req-1/status", server.uri()),
            "response_url": format!("{}/requests/req-1", server.uri()),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/requests/req-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/requests/req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result))
        .mount(server)
        .await;
}

/// Serve raw mesh bytes at `asset_path` on the mock server.
pub async fn stub_mesh_asset(server: &MockServer, asset_path: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(asset_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

/// A well-formed conversion request body.
pub fn convert_body() -> serde_json::Value {
    json!({
        "imageUrl": "data:image/png;base64,AAAA",
        "settings": {
            "output_format": "glb",
            "do_remove_background": true,
            "foreground_ratio": 0.9,
            "mc_resolution": 256,
        }
    })
}
