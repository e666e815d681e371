//! Router assembly: endpoints, CORS, security headers, tracing, and the
//! optional static frontend bundle.

use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers::{download, search};
use crate::infra::app_state::AppState;
use crate::infra::config::Config;

pub fn create_app(state: AppState) -> Router {
    let cors_layer = build_cors(&state.config);

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search::search_handler))
        .route("/cancel/{search_id}", post(search::cancel_handler))
        .route("/download/{filename}", get(download::download_handler));

    // Frontend bundle is plain static glue; only mounted when configured
    // and present.
    if let Some(dir) = state
        .config
        .frontend_dir
        .as_ref()
        .filter(|dir| dir.is_dir())
    {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn build_cors(config: &Config) -> CorsLayer {
    if config.allowed_origin == "*" {
        return CorsLayer::new()
            .allow_origin(AllowOrigin::any())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(AllowHeaders::any());
    }

    match HeaderValue::from_str(&config.allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST])
            // Wildcard headers can't be combined with credentials; echo the
            // requested headers instead.
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        Err(err) => {
            warn!(origin = %config.allowed_origin, "invalid ALLOWED_ORIGIN, falling back to any: {err}");
            CorsLayer::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(AllowHeaders::any())
        }
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.insert(
        HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("1; mode=block"),
    );
    response
}
