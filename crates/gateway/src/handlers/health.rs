//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use minjok_common::{config::CacheBackend, errors::Result};
use serde::Serialize;
use std::time::Instant;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    /// Present only when the profile cache is shared (Redis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CheckResult>,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: minjok_common::VERSION.to_string(),
    })
}

impl CheckResult {
    fn from_ping(result: Result<()>, start: Instant) -> Self {
        match result {
            Ok(()) => CheckResult {
                status: "up".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => CheckResult {
                status: "down".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Readiness probe - checks the database, and Redis when it backs the cache
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = Instant::now();
    let database = CheckResult::from_ping(state.db.ping().await, start);

    let cache = if state.config.cache.backend == CacheBackend::Redis {
        let start = Instant::now();
        Some(CheckResult::from_ping(state.profile_cache.ping().await, start))
    } else {
        None
    };

    let all_healthy = database.is_up() && cache.as_ref().map_or(true, CheckResult::is_up);
    let code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks { database, cache },
        }),
    )
}
