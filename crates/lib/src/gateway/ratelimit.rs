//! Fixed-window request rate limiting keyed by client address.
//!
//! Bounds total invocation throughput so the external processes cannot be
//! used for resource exhaustion. One window per client IP; the counter resets
//! when the window elapses.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Window {
    started: Instant,
    count: u32,
}

/// Per-client fixed-window request counter.
pub struct RateLimiter {
    window: Duration,
    limit: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            window,
            limit,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request from `client`; false when the client has exhausted
    /// its allowance for the current window.
    pub async fn allow(&self, client: IpAddr) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        // Drop idle clients once the map grows.
        if clients.len() > 1024 {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }
        let w = clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(w.started) >= self.window {
            w.started = now;
            w.count = 0;
        }
        if w.count >= self.limit {
            return false;
        }
        w.count += 1;
        true
    }
}
