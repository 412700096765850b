//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DocVault metrics
pub const METRICS_PREFIX: &str = "docvault";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for collaborator calls (chat, enrichment), which run much longer
pub const COLLABORATOR_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
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

    // Document metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents uploaded"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total bytes uploaded"
    );

    describe_counter!(
        format!("{}_listing_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total document listing queries"
    );

    describe_histogram!(
        format!("{}_listing_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document listing latency in seconds"
    );

    // Chat metrics
    describe_counter!(
        format!("{}_chat_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat questions by outcome"
    );

    describe_histogram!(
        format!("{}_chat_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Reasoning collaborator latency in seconds"
    );

    // Enrichment metrics
    describe_counter!(
        format!("{}_enrichments_total", METRICS_PREFIX),
        Unit::Count,
        "Total enrichment passes by outcome"
    );

    describe_histogram!(
        format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Enrichment pass latency in seconds"
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

pub fn record_upload(mime_type: &str, bytes: usize) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "mime_type" => mime_type.to_string()
    )
    .increment(1);

    counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(bytes as u64);
}

/// `scope` is "role" for role-filtered listings, "all" for admin listings
pub fn record_listing(duration_secs: f64, scope: &'static str, searched: bool) {
    counter!(
        format!("{}_listing_queries_total", METRICS_PREFIX),
        "scope" => scope,
        "search" => if searched { "yes" } else { "no" }
    )
    .increment(1);

    histogram!(
        format!("{}_listing_duration_seconds", METRICS_PREFIX),
        "scope" => scope
    )
    .record(duration_secs);
}

pub fn record_chat(duration_secs: f64, kind: &'static str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_chat_requests_total", METRICS_PREFIX),
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_chat_duration_seconds", METRICS_PREFIX),
            "kind" => kind
        )
        .record(duration_secs);
    }
}

pub fn record_enrichment(duration_secs: f64, success: bool) {
    let outcome = if success { "completed" } else { "failed" };

    counter!(
        format!("{}_enrichments_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome
    )
    .record(duration_secs);
}
