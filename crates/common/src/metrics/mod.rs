//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all journal metrics
pub const METRICS_PREFIX: &str = "minjok";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Paper lifecycle
    describe_counter!(
        format!("{}_papers_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Paper status changes by action"
    );

    describe_counter!(
        format!("{}_versions_uploaded_total", METRICS_PREFIX),
        Unit::Count,
        "Paper versions stored"
    );

    describe_counter!(
        format!("{}_uploads_throttled_total", METRICS_PREFIX),
        Unit::Count,
        "Version uploads rejected by the cooldown"
    );

    describe_counter!(
        format!("{}_comments_posted_total", METRICS_PREFIX),
        Unit::Count,
        "Comments posted by target"
    );

    describe_counter!(
        format!("{}_catalog_created_total", METRICS_PREFIX),
        Unit::Count,
        "Issues and volumes created"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_transition(action: &str) {
    counter!(
        format!("{}_papers_transitions_total", METRICS_PREFIX),
        "action" => action.to_string()
    )
    .increment(1);
}

pub fn record_version_uploaded() {
    counter!(format!("{}_versions_uploaded_total", METRICS_PREFIX)).increment(1);
}

pub fn record_upload_throttled() {
    counter!(format!("{}_uploads_throttled_total", METRICS_PREFIX)).increment(1);
}

/// `target` is "paper" or "board"
pub fn record_comment(target: &str) {
    counter!(
        format!("{}_comments_posted_total", METRICS_PREFIX),
        "target" => target.to_string()
    )
    .increment(1);
}

/// `kind` is "issue" or "volume"
pub fn record_catalog_created(kind: &str) {
    counter!(
        format!("{}_catalog_created_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/papers");
        metrics.finish(200);
        record_transition("publish");
        record_comment("paper");
        record_cache(true, "profile_memory");
    }
}
