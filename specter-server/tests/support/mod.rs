//! Shared helpers for driving the router in-process with a stand-in
//! sherlock executable.
#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tempfile::TempDir;

use specter_server::search::sherlock::SherlockTool;
use specter_server::{AppState, Config, create_app};

pub struct TestServer {
    pub state: AppState,
    pub app: Router,
    // Holds the scratch/result/tool directories alive for the test.
    pub tmp: TempDir,
}

/// Build a server around an optional fake tool script. The script body runs
/// under `/bin/sh` with the username as `$1`.
pub fn build_server(script: Option<&str>, mutate: impl FnOnce(&mut Config)) -> TestServer {
    let tmp = TempDir::new().expect("tempdir");
    let tool = script.map(|body| fake_tool(tmp.path(), body));

    let mut config = Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        sherlock_path: None,
        log_level: "info".to_string(),
        allowed_origin: "*".to_string(),
        max_concurrent_searches: 3,
        search_timeout: Duration::from_secs(10),
        total_sites: 405,
        rate_limit_per_minute: 1000,
        scratch_dir: tmp.path().to_path_buf(),
        results_dir: tmp.path().join("results"),
        cleanup_age: Duration::from_secs(600),
        cleanup_interval: Duration::from_secs(300),
        frontend_dir: None,
    };
    mutate(&mut config);
    config.ensure_directories().expect("create directories");

    let state = AppState::with_tool(config, tool);
    let app = create_app(state.clone());
    TestServer { state, app, tmp }
}

fn fake_tool(dir: &Path, body: &str) -> SherlockTool {
    let path = dir.join("fake-sherlock");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake tool");
    }
    SherlockTool::from_path(path)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

/// Collect a finished SSE body and parse every `data:` payload as JSON.
pub async fn collect_sse_events(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let raw = String::from_utf8_lossy(&bytes);
    raw.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).expect("valid event json"))
        .collect()
}

/// Read the next `data:` event from a live SSE body, skipping keep-alive
/// comments. `None` once the stream ends.
pub async fn next_data_event(body: &mut Body) -> Option<serde_json::Value> {
    while let Some(frame) = body.frame().await {
        let frame = frame.ok()?;
        let Some(data) = frame.data_ref() else {
            continue;
        };
        let text = String::from_utf8_lossy(data);
        for line in text.lines() {
            if let Some(payload) = line.strip_prefix("data: ") {
                return serde_json::from_str(payload).ok();
            }
        }
    }
    None
}

/// Drain the remaining `data:` events from a live SSE body.
pub async fn drain_data_events(mut body: Body) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Some(event) = next_data_event(&mut body).await {
        events.push(event);
    }
    events
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid json body")
}
