//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Catalog listings and the listing cache
//! - Download batches
//! - Post-processing and art lookups

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Directory listings total by host type and result.
pub static LISTINGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("romhaul_listings_total", "Total remote directory listings"),
        &["host_type", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Items returned per listing.
pub static LISTING_ITEMS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("romhaul_listing_items", "Number of items per listing")
            .buckets(vec![0.0, 10.0, 100.0, 500.0, 1000.0, 5000.0, 20000.0]),
        &["host_type"],
    )
    .unwrap()
});

/// Listing cache hits.
pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("romhaul_cache_hits_total", "Total listing cache hits").unwrap()
});

/// Listing cache misses.
pub static CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("romhaul_cache_misses_total", "Total listing cache misses").unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads started total.
pub static DOWNLOADS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("romhaul_downloads_started_total", "Total downloads started").unwrap()
});

/// Downloads completed total.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "romhaul_downloads_completed_total",
        "Total downloads completed successfully",
    )
    .unwrap()
});

/// Downloads failed total.
pub static DOWNLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "romhaul_downloads_failed_total",
        "Total downloads that failed",
    )
    .unwrap()
});

/// Bytes written by completed downloads.
pub static DOWNLOADED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "romhaul_downloaded_bytes_total",
        "Total bytes written by completed downloads",
    )
    .unwrap()
});

// =============================================================================
// Post-processing Metrics
// =============================================================================

/// Archive extractions and layout steps by result.
pub static EXTRACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("romhaul_extractions_total", "Total post-processing steps"),
        &["step", "result"], // step: "unzip", "bin_cue", "multi_disc"
    )
    .unwrap()
});

/// Art lookups by result.
pub static ART_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("romhaul_art_lookups_total", "Total cover art lookups"),
        &["result"], // "found", "not_found", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Catalog
        Box::new(LISTINGS_TOTAL.clone()),
        Box::new(LISTING_ITEMS.clone()),
        Box::new(CACHE_HITS.clone()),
        Box::new(CACHE_MISSES.clone()),
        // Downloads
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOADS_COMPLETED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(DOWNLOADED_BYTES.clone()),
        // Post-processing
        Box::new(EXTRACTIONS_TOTAL.clone()),
        Box::new(ART_LOOKUPS.clone()),
    ]
}
