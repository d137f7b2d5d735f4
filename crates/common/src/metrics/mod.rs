//! Metrics and observability utilities
//!
//! Prometheus-style metrics for fact-check runs, research calls and the
//! HTTP surface, with standardized naming.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all fact checker metrics
pub const METRICS_PREFIX: &str = "factcheck";

/// Buckets for whole-run latency (in seconds); runs are dominated by
/// network-bound research and reasoning calls
pub const RUN_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s - default deadline
    90.00,  // 90s
];

/// Buckets for a single research call
pub const RESEARCH_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    15.00,  // 15s
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

    // Run metrics
    describe_counter!(
        format!("{}_checks_total", METRICS_PREFIX),
        Unit::Count,
        "Total fact-check runs by outcome"
    );

    describe_histogram!(
        format!("{}_check_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Fact-check run latency in seconds"
    );

    describe_counter!(
        format!("{}_claims_evaluated_total", METRICS_PREFIX),
        Unit::Count,
        "Claims evaluated, by verified/failed status"
    );

    // Research metrics
    describe_counter!(
        format!("{}_research_calls_total", METRICS_PREFIX),
        Unit::Count,
        "Research gateway calls by status"
    );

    describe_histogram!(
        format!("{}_research_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Research gateway call latency in seconds"
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

    /// Record request completion, returning the elapsed milliseconds
    pub fn finish(self, status: u16) -> u64 {
        let elapsed = self.start.elapsed();

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
        .record(elapsed.as_secs_f64());

        elapsed.as_millis() as u64
    }
}

/// Helper to record a completed run
pub fn record_check(duration_secs: f64, facts: usize, failed: usize) {
    counter!(
        format!("{}_checks_total", METRICS_PREFIX),
        "outcome" => "completed"
    )
    .increment(1);

    histogram!(format!("{}_check_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    counter!(
        format!("{}_claims_evaluated_total", METRICS_PREFIX),
        "status" => "verified"
    )
    .increment(facts.saturating_sub(failed) as u64);

    counter!(
        format!("{}_claims_evaluated_total", METRICS_PREFIX),
        "status" => "failed"
    )
    .increment(failed as u64);
}

/// Helper to record a run that failed as a whole
pub fn record_check_failure(reason: &'static str) {
    counter!(
        format!("{}_checks_total", METRICS_PREFIX),
        "outcome" => reason
    )
    .increment(1);
}

/// Helper to record research gateway calls
pub fn record_research(duration_secs: f64, provider: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_research_calls_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_research_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [RUN_BUCKETS, RESEARCH_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/check");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let elapsed = metrics.finish(200);
        assert!(elapsed >= 5);
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls must be no-ops
        record_check(0.5, 3, 1);
        record_check_failure("extraction_failed");
        record_research(0.1, "mock", false);
    }
}
