//! Session authentication and rate limiting.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use uuid::Uuid;

use super::AppState;
use crate::config::AppConfig;
use crate::firebase::AuthError;

/// Browser-facing security settings.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Allowed CORS origins; `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    /// Limiter applied to the unauthenticated account routes.
    pub rate_limiter: Option<RateLimiter>,
}

impl SecurityConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        let rate_limiter = if config.rate_limit > 0 {
            Some(
                RateLimiter::new(config.rate_limit, Duration::from_secs(60))
                    .trust_proxy_headers(config.trust_proxy_headers),
            )
        } else {
            None
        };
        Self {
            cors_origins: config.cors_origins.clone(),
            rate_limiter,
        }
    }

    /// No CORS restriction and no rate limit (local development/testing).
    pub fn disabled() -> Self {
        Self {
            cors_origins: None,
            rate_limiter: None,
        }
    }

    /// Create a config with rate limiting enabled.
    pub fn with_rate_limit(max_requests: u32) -> Self {
        Self {
            cors_origins: None,
            rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
        }
    }
}

/// Simple in-memory rate limiter using sliding window.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Maximum requests allowed per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
    /// Request counts per IP
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
    /// Key on `X-Forwarded-For`/`X-Real-IP` instead of the peer address
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(HashMap::new())),
            trust_proxy_headers: false,
        }
    }

    /// Only enable behind a reverse proxy that overwrites these headers;
    /// otherwise any client can pick its own bucket.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Record a request from `ip`. Returns false if it is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let entry = requests.entry(ip).or_default();

        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Forget IPs with no requests inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < self.window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_ips(&self) -> usize {
        self.requests.lock().expect("rate limiter lock poisoned").len()
    }
}

/// The signed-in user, available to handlers behind [`auth_middleware`].
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub session_id: Uuid,
    pub email: String,
}

/// Require a valid `Authorization: Bearer <session token>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::warn!("Missing or malformed Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Ok(session_id) = Uuid::parse_str(token.trim()) else {
        tracing::warn!("Malformed session token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let session = match state
        .sessions
        .refresh_if_expired(session_id, state.identity.as_ref())
        .await
    {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::warn!("Unknown session token");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(AuthError::SessionExpired) => {
            tracing::warn!("Session {} could not be refreshed", session_id);
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            tracing::error!("Token refresh failed: {}", e);
            return Err(StatusCode::BAD_GATEWAY);
        }
    };

    request.extensions_mut().insert(CurrentUser {
        session_id,
        email: session.email,
    });
    Ok(next.run(request).await)
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = extract_client_ip(&request, rate_limiter.trust_proxy_headers);

    if rate_limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Extract client IP from request.
///
/// The peer address comes from `ConnectInfo`, which requires serving with
/// `into_make_service_with_connect_info`.
fn extract_client_ip(request: &Request<Body>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn forwarded_ip(request: &Request<Body>) -> Option<IpAddr> {
    // Try X-Forwarded-For header first (for proxied requests)
    if let Some(forwarded) = request.headers().get("X-Forwarded-For") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip_str) = value.split(',').next() {
                if let Ok(ip) = ip_str.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    let real_ip = request.headers().get("X-Real-IP")?.to_str().ok()?;
    real_ip.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_limiter_allows_requests_under_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip));
        }
    }

    #[test]
    fn rate_limiter_blocks_requests_over_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));

        assert!(!limiter.check(ip));
    }

    #[test]
    fn rate_limiter_tracks_ips_independently() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        assert!(limiter.check(ip1));
        assert!(limiter.check(ip1));
        assert!(!limiter.check(ip1));

        assert!(limiter.check(ip2));
        assert!(limiter.check(ip2));
        assert!(!limiter.check(ip2));
    }

    #[test]
    fn cleanup_forgets_idle_ips() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1));
        limiter.check("10.0.0.1".parse().unwrap());
        std::thread::sleep(Duration::from_millis(5));

        limiter.cleanup();
        assert_eq!(limiter.tracked_ips(), 0);
    }

    fn request_from(peer: &str, forwarded_for: &str) -> Request<Body> {
        let mut request = Request::builder()
            .header("X-Forwarded-For", forwarded_for)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>(peer.parse().unwrap()));
        request
    }

    #[test]
    fn client_ip_is_the_peer_address_by_default() {
        let request = request_from("203.0.113.7:51000", "9.9.9.9");

        let ip = extract_client_ip(&request, false);

        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn client_ip_follows_forwarding_headers_when_trusted() {
        let request = request_from("10.0.0.2:51000", "9.9.9.9, 10.0.0.2");

        assert_eq!(
            extract_client_ip(&request, true),
            "9.9.9.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn security_config_follows_app_config() {
        let config = AppConfig {
            rate_limit: 0,
            cors_origins: Some(vec!["http://localhost:5173".to_string()]),
            ..AppConfig::default()
        };
        let security = SecurityConfig::from_config(&config);
        assert!(security.rate_limiter.is_none());
        assert_eq!(security.cors_origins.unwrap().len(), 1);

        let behind_proxy = AppConfig {
            trust_proxy_headers: true,
            ..AppConfig::default()
        };
        let limiter = SecurityConfig::from_config(&behind_proxy).rate_limiter.unwrap();
        assert!(limiter.trust_proxy_headers);

        assert!(SecurityConfig::disabled().rate_limiter.is_none());
    }
}
