//! Request throttling and response hardening
//!
//! Seat locks, booking attempts and token requests are throttled per caller
//! with a keyed GCRA limiter: a caller starts with `requests` attempts and gets
//! one back every `window / requests`. Authenticated routes key on the token
//! subject, the token endpoint on the client address.

use actix_web::{http::header, middleware::DefaultHeaders, HttpRequest};
use coach_core::config::{RateLimit, RateLimitConfig};
use coach_core::{AppError, AppResult};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{info, warn};

/// Idle keys are dropped once a limiter tracks more than this many callers
const PRUNE_ABOVE: usize = 10_000;

/// One keyed limiter; clones share the same buckets
#[derive(Clone)]
pub struct Throttle {
    name: &'static str,
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
}

impl Throttle {
    /// A limit of zero requests disables the throttle
    pub fn new(name: &'static str, limit: RateLimit) -> Self {
        let limiter = Quota::with_period(limit.replenish_every())
            .zip(NonZeroU32::new(limit.requests))
            .map(|(quota, burst)| Arc::new(RateLimiter::keyed(quota.allow_burst(burst))));

        Self { name, limiter }
    }

    pub fn unlimited(name: &'static str) -> Self {
        Self {
            name,
            limiter: None,
        }
    }

    /// Spend one attempt for `key`
    pub fn check(&self, key: &str) -> AppResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        if limiter.len() > PRUNE_ABOVE {
            limiter.retain_recent();
        }

        limiter.check_key(&key.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            warn!(throttle = self.name, key, "Throttled for {:?}", wait);
            AppError::TooManyAttempts {
                retry_after_secs: wait.as_secs().max(1),
            }
        })
    }
}

/// Every throttle the API applies
#[derive(Clone)]
pub struct Throttles {
    pub bookings: Throttle,
    pub reservations: Throttle,
    pub auth: Throttle,
}

impl Throttles {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            info!("Rate limiting disabled");
            return Self::unlimited();
        }

        Self {
            bookings: Throttle::new("bookings", config.bookings),
            reservations: Throttle::new("reservations", config.reservations),
            auth: Throttle::new("auth", config.auth),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            bookings: Throttle::unlimited("bookings"),
            reservations: Throttle::unlimited("reservations"),
            auth: Throttle::unlimited("auth"),
        }
    }
}

/// Throttle key for unauthenticated requests
pub fn client_key(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Headers added to every response
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((
            header::CONTENT_SECURITY_POLICY,
            "default-src 'self'; connect-src 'self' ws: wss:; img-src 'self' data:; frame-ancestors 'none'",
        ))
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::X_FRAME_OPTIONS, "DENY"))
        .add((header::X_XSS_PROTECTION, "1; mode=block"))
        .add((header::REFERRER_POLICY, "strict-origin-when-cross-origin"))
        .add((
            "Permissions-Policy",
            "camera=(), microphone=(), geolocation=()",
        ))
}
