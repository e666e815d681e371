//! Mid-stream cancellation: no events after the cancel takes effect, the
//! process is reclaimed, and the registry entry is gone. A cancel for an
//! unknown id is not-found, twice in a row.

mod support;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use support::{build_server, drain_data_events, get, json_body, next_data_event, post};

const HANGING_SCRIPT: &str = r#"echo "[+] Site1: url"
sleep 30
echo "[+] Site2: url""#;

#[tokio::test]
async fn cancel_stops_the_stream_and_clears_the_registry() {
    let server = build_server(Some(HANGING_SCRIPT), |_| {});

    let response = server
        .app
        .clone()
        .oneshot(get("/search?username=alice"))
        .await
        .unwrap();
    let mut body = response.into_body();

    let opened = next_data_event(&mut body).await.unwrap();
    let search_id = opened["search_id"].as_str().unwrap().to_string();

    let progress = next_data_event(&mut body).await.unwrap();
    assert_eq!(progress["result"], "[+] Site1: url");
    assert!(server.state.registry.contains(&search_id));

    let response = server
        .app
        .clone()
        .oneshot(post(&format!("/cancel/{search_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "cancelled"}));

    // The supervisor observes the cancellation and ends the stream without
    // emitting anything further; the tool never gets to its second line.
    let remaining = tokio::time::timeout(Duration::from_secs(10), drain_data_events(body))
        .await
        .expect("stream should close promptly after cancel");
    assert!(remaining.is_empty(), "unexpected events: {remaining:?}");

    assert!(!server.state.registry.contains(&search_id));

    // Cancelling again reports not-found.
    let response = server
        .app
        .clone()
        .oneshot(post(&format!("/cancel/{search_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"status": "not_found"}));
}

#[tokio::test]
async fn cancel_unknown_id_is_not_found() {
    let server = build_server(None, |_| {});
    let response = server
        .app
        .oneshot(post("/cancel/deadbeefdeadbeefdeadbeefdeadbeef"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"status": "not_found"}));
}
