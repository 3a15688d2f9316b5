//! Login throttling
//!
//! Two sliding windows guard the login endpoint:
//! - failed attempts per identity (email): 5 per 15 minutes
//! - login requests per client IP: 10 per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const IDENTITY_LIMIT: usize = 5;
const IDENTITY_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

/// Timestamps of recent events per key, trimmed to a fixed window
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        let times = events.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= self.limit
    }

    async fn record(&self, key: K) {
        self.events.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self) {
        let cutoff = Utc::now() - self.window;
        self.events.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

pub struct LoginRateLimiter {
    identities: SlidingWindow<String>,
    ips: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            identities: SlidingWindow::new(
                IDENTITY_LIMIT,
                Duration::minutes(IDENTITY_WINDOW_MINUTES),
            ),
            ips: SlidingWindow::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Too many recent failures for this identity (case-insensitive)
    pub async fn is_identity_limited(&self, identity: &str) -> bool {
        self.identities.is_limited(normalize(identity)).await
    }

    pub async fn record_failure(&self, identity: &str) {
        self.identities.record(normalize(identity)).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_failures(&self, identity: &str) {
        self.identities.clear(&normalize(identity)).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        self.identities.prune().await;
        self.ips.prune().await;
    }

    /// Number of identities and IPs currently tracked
    pub async fn tracked(&self) -> (usize, usize) {
        (self.identities.len().await, self.ips.len().await)
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}
