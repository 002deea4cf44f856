//! Fixed-window rate limiting for the credential endpoints.
//!
//! Windows live in a TTL cache, so the window for a key opens at its first
//! request and the whole entry disappears once the window expires. Idle
//! keys cost nothing.

use axum::http::HeaderMap;
use moka::sync::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const MAX_TRACKED_KEYS: u64 = 100_000;

pub struct RateLimiter {
    windows: Cache<String, Arc<AtomicU32>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_KEYS)
            .time_to_live(window)
            .build();

        RateLimiter {
            windows,
            max_requests,
            window,
        }
    }

    /// Count a request against the key's current window. `Err` carries the
    /// seconds a client should wait, for the `retry-after` header.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let counter = self
            .windows
            .get_with(key.to_string(), || Arc::new(AtomicU32::new(0)));

        let previous = counter.fetch_add(1, Ordering::Relaxed);
        if previous >= self.max_requests {
            return Err(self.window.as_secs());
        }

        Ok(())
    }
}

/// Rate-limit key for a request: the first `x-forwarded-for` hop when
/// present (the deployment sits behind a proxy), else the peer address.
pub fn client_key(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}
