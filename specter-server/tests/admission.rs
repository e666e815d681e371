//! Admission control: the concurrency pool rejects fast when saturated, and
//! the per-client rate limit rejects before the pool is even consulted.

mod support;

use axum::http::StatusCode;
use tower::ServiceExt;

use support::{build_server, get, json_body, next_data_event};

const SLOW_SCRIPT: &str = r#"echo "[+] Site1: url"
sleep 30"#;

#[tokio::test]
async fn saturated_pool_returns_busy_until_a_slot_frees() {
    let server = build_server(Some(SLOW_SCRIPT), |config| {
        config.max_concurrent_searches = 1;
    });

    // First request takes the only permit; poll its stream far enough to
    // know the job is really running.
    let first = server
        .app
        .clone()
        .oneshot(get("/search?username=alice"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let mut first_body = first.into_body();
    let opened = next_data_event(&mut first_body).await.unwrap();
    assert!(opened["search_id"].is_string());

    // Second request is rejected immediately, before any stream opens.
    let second = server
        .app
        .clone()
        .oneshot(get("/search?username=bob"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(second).await;
    assert!(body["error"].as_str().unwrap().contains("busy"));

    // Dropping the first stream releases the permit and its process.
    drop(first_body);

    let third = server
        .app
        .clone()
        .oneshot(get("/search?username=carol"))
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_before_concurrency() {
    let server = build_server(Some(SLOW_SCRIPT), |config| {
        config.rate_limit_per_minute = 2;
        config.max_concurrent_searches = 10;
    });

    let request = |name: &str| {
        let mut req = get(&format!("/search?username={name}"));
        req.headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        req
    };

    let first = server.app.clone().oneshot(request("alice")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = server.app.clone().oneshot(request("bob")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let third = server.app.clone().oneshot(request("carol")).await.unwrap();
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(third).await;
    assert!(body["error"].as_str().unwrap().contains("Too many requests"));

    // A different client identity is unaffected.
    let mut other = get("/search?username=dave");
    other
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.7".parse().unwrap());
    let response = server.app.clone().oneshot(other).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
