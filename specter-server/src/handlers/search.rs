//! Search stream and cancellation endpoints.

use std::convert::Infallible;
use std::pin::pin;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;
use crate::infra::rate_limit::ClientAddr;
use crate::search::events::SearchEvent;
use crate::search::supervisor;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub username: String,
}

/// `GET /search?username=...` — admit, then stream the scan as SSE.
///
/// Admission is two layered rejections before any stream opens: the
/// per-client rate limit (429), then the shared concurrency pool (503).
/// The first event on an admitted stream carries the search id so the
/// client can cancel; everything after comes from the supervisor verbatim.
pub async fn search_handler(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    if !state.rate_limiter.check(&client) {
        return Err(AppError::rate_limited(
            "Too many requests. Try again later.",
        ));
    }

    let permit = state
        .permits
        .clone()
        .try_acquire_owned()
        .map_err(|_| AppError::busy("Server is busy. Please try again shortly."))?;

    let search_id = Uuid::new_v4().simple().to_string();
    info!(%search_id, username = %query.username, %client, "search admitted");

    let stream = {
        let state = state.clone();
        let search_id = search_id.clone();
        let username = query.username;
        async_stream::stream! {
            // The permit rides inside the stream so it is released exactly
            // once on any terminal path, a client disconnect included.
            let _permit = permit;
            yield Ok::<Event, Infallible>(encode_event(&SearchEvent::opened(search_id.clone())));

            let mut events = pin!(supervisor::run(state, username, search_id));
            while let Some(event) = events.next().await {
                yield Ok(encode_event(&event));
            }
        }
    };

    let mut response = Sse::new(stream)
        .keep_alive(default_keep_alive())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&search_id) {
        headers.insert(HeaderName::from_static("x-search-id"), value);
    }
    Ok(response)
}

/// `POST /cancel/{search_id}` — request termination of a running search.
///
/// Removing the registry entry is the cancellation signal the supervisor
/// watches; a second cancel on the same id is not-found, not an error.
pub async fn cancel_handler(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Response {
    if state.registry.cancel(&search_id) {
        info!(%search_id, "cancellation requested");
        Json(json!({ "status": "cancelled" })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found" })),
        )
            .into_response()
    }
}

fn encode_event(event: &SearchEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().data(data),
        Err(err) => {
            warn!("failed to serialize search event: {err}");
            Event::default().data(r#"{"error":"internal serialization error"}"#)
        }
    }
}

fn default_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("keep-alive")
}
