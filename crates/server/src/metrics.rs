//! Prometheus metrics for observability.
//!
//! HTTP request metrics live here. Catalog, download and post-processing
//! metrics come from `romhaul_core::metrics` and share the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "romhaul_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        // Batch downloads hold the request open until every transfer ends.
        .buckets(vec![
            0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("romhaul_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently being served.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "romhaul_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    for metric in romhaul_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

static SOURCE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/sources/[^/]+").unwrap());
static SECTION_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/sections/[^/]+").unwrap());

/// Normalize a path for metric labels (source and section names become
/// placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = SOURCE_SEGMENT.replace_all(path, "/sources/{source}");
    let result = SECTION_SEGMENT.replace_all(&result, "/sections/{section}");
    result.into_owned()
}
