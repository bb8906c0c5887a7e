// Fixed-window per-IP rate limiting. Load shedding happens here; nothing
// downstream applies backpressure of its own.

use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (requests in window, window start)
    clients: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Returns true if the request fits inside the caller's current window.
    pub fn check(&self, client_ip: &str) -> bool {
        let mut clients = self.clients.lock().unwrap();
        let now = Instant::now();

        match clients.get_mut(client_ip) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) > self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                clients.insert(client_ip.to_string(), (1, now));
                true
            }
        }
    }

    pub fn cleanup_expired(&self) {
        let mut clients = self.clients.lock().unwrap();
        let now = Instant::now();

        clients.retain(|_, (_, window_start)| now.duration_since(*window_start) <= self.window);
    }
}

/// General API limit: 100 requests per minute per IP.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    static RATE_LIMITER: std::sync::OnceLock<RateLimiter> = std::sync::OnceLock::new();
    let rate_limiter = RATE_LIMITER.get_or_init(|| RateLimiter::new(100, 60));

    let client_ip = addr.ip().to_string();

    if !rate_limiter.check(&client_ip) {
        tracing::warn!("Rate limit exceeded for IP: {}", client_ip);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after": 60
            })),
        ));
    }

    // Occasionally sweep expired windows
    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
    }

    Ok(next.run(request).await)
}

/// Tighter limit for the auth endpoints: 10 requests per minute per IP.
pub async fn strict_rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    static STRICT_RATE_LIMITER: std::sync::OnceLock<RateLimiter> = std::sync::OnceLock::new();
    let rate_limiter = STRICT_RATE_LIMITER.get_or_init(|| RateLimiter::new(10, 60));

    let client_ip = addr.ip().to_string();

    if !rate_limiter.check(&client_ip) {
        tracing::warn!("Strict rate limit exceeded for IP: {}", client_ip);
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded for sensitive operations. Please try again later.",
                "retry_after": 60
            })),
        ));
    }

    // Occasionally sweep expired windows
    if rand::random::<u8>() < 10 {
        rate_limiter.cleanup_expired();
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced_within_window() {
        let limiter = RateLimiter::new(3, 60);
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn test_limits_are_per_ip() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check("1.1.1.1"));
        assert!(!limiter.check("1.1.1.1"));
        assert!(limiter.check("2.2.2.2"));
    }

    #[test]
    fn test_window_reset() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check("1.1.1.1"));
        std::thread::sleep(Duration::from_millis(5));
        // zero-length window has expired, counter resets
        assert!(limiter.check("1.1.1.1"));
    }

    #[test]
    fn test_cleanup_drops_expired_entries() {
        let limiter = RateLimiter::new(5, 0);
        limiter.check("1.1.1.1");
        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup_expired();
        assert!(limiter.clients.lock().unwrap().is_empty());
    }
}
