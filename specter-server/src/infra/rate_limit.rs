//! Per-client request rate limiting for the search endpoint.
//!
//! A sliding-window log keyed by client identity. This runs before the
//! concurrency permit is attempted, so a chatty client is told to back off
//! (429) without ever touching the search admission pool.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use dashmap::DashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Every how many admission checks the whole map is swept for expired keys.
const SWEEP_INTERVAL: u64 = 1024;

/// Sliding-window request limiter. One log of admission timestamps per
/// client key; a request is admitted while fewer than `limit` timestamps
/// fall inside the trailing window.
///
/// Keys come from client-controlled input, so the map is swept on a fixed
/// cadence: a client minting a fresh identity per request leaves entries
/// that expire with their window instead of accumulating for the process
/// lifetime.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    buckets: DashMap<String, Vec<Instant>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Record a request for `key` and report whether it is admitted.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == 0 {
            self.evict_expired(now);
        }

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|seen| now.duration_since(*seen) < self.window);

        if entry.len() < self.limit as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Drop every bucket whose whole log has aged out of the window.
    fn evict_expired(&self, now: Instant) {
        self.buckets
            .retain(|_, log| log.iter().any(|seen| now.duration_since(*seen) < self.window));
    }
}

/// Client identity used as the rate-limit key: the first `x-forwarded-for`
/// hop when present, else the peer socket address.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
        {
            if let Some(first) = forwarded
                .split(',')
                .next()
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
            {
                return Ok(Self(first.to_string()));
            }
        }

        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(Self(addr.unwrap_or_else(|| "unknown".to_string())))
    }
}
