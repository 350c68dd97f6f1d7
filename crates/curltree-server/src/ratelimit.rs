//! Per-client token buckets.

use axum::http::HeaderMap;
use curltree_core::config::RateLimitConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    tokens_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            tokens_per_sec: f64::from(requests_per_minute) / 60.0,
            burst: f64::from(burst.max(1)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_minute, config.burst)
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refilled(&self, bucket: &Bucket, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        (bucket.tokens + elapsed * self.tokens_per_sec).min(self.burst)
    }

    /// Takes one token for `client`. False when the bucket is empty.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut buckets = self.buckets();
        let burst = self.burst;
        let bucket = buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: burst,
            last_refill: now,
        });
        let tokens = self.refilled(bucket, now);
        bucket.last_refill = now;
        if tokens >= 1.0 {
            bucket.tokens = tokens - 1.0;
            true
        } else {
            bucket.tokens = tokens;
            false
        }
    }

    /// Drops buckets that have refilled completely. Returns how many went.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets();
        let before = buckets.len();
        let burst = self.burst;
        buckets.retain(|_, bucket| self.refilled(bucket, now) < burst);
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets().len()
    }

    pub fn start_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.cleanup_at(Instant::now());
                if removed > 0 {
                    debug!(event = "rate_limit_cleanup", removed);
                }
            }
        })
    }
}

/// First `X-Forwarded-For` entry, else `X-Real-IP`, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    if let Some(first) = header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn burst_then_refill() {
        let limiter = RateLimiter::new(60, 3);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("1.2.3.4", start));
        }
        assert!(!limiter.check_at("1.2.3.4", start));
        assert!(limiter.check_at("5.6.7.8", start), "clients are independent");

        let later = start + Duration::from_millis(1100);
        assert!(limiter.check_at("1.2.3.4", later));
        assert!(!limiter.check_at("1.2.3.4", later));
    }

    #[test]
    fn cleanup_evicts_full_buckets_only() {
        let limiter = RateLimiter::new(60, 2);
        let start = Instant::now();
        limiter.check_at("idle", start);
        limiter.check_at("busy", start + Duration::from_secs(5));
        limiter.check_at("busy", start + Duration::from_secs(5));

        let removed = limiter.cleanup_at(start + Duration::from_secs(5));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn client_key_prefers_forwarded_headers() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().expect("addr");
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_key(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_key(&headers, Some(peer)), "192.0.2.7");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.5 , 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.5");
    }
}
