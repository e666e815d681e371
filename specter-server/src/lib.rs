//! # Specter Server
//!
//! Web API around the sherlock username-enumeration tool.
//!
//! A client submits a username, the server launches one sherlock process per
//! request, relays its progress line by line over a server-sent-event stream,
//! and finally offers the positive hits as a one-time download. The
//! interesting part is the lifecycle layer: bounded admission, per-search
//! cancellation, timeout enforcement, and cleanup of processes and result
//! files on every exit path.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod results;
pub mod routes;
pub mod search;

pub use infra::app_state::AppState;
pub use infra::config::Config;
pub use routes::create_app;
