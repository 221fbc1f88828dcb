//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use minjok_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Process-wide limiter plus the rate it was built with
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<GlobalRateLimiter>,
    per_second: u32,
}

impl RateLimit {
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> RateLimit {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    RateLimit {
        limiter: Arc::new(RateLimiter::direct(quota)),
        per_second: rate.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(limit): State<RateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limit.check() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        Err(AppError::RateLimited {
            limit: limit.per_second,
        })
    }
}
