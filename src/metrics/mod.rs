//! Prometheus metrics for the template cache.
//!
//! Collectors are registered once in the default registry:
//! - Cache lookups (hits, misses)
//! - Loader outcomes (loaded, not found, load errors)
//! - Generational purge (sweeps, evictions, failed cycles)
//! - Render latency

mod helpers;

pub use helpers::{encode_metrics, CacheMetrics, LoadOutcome, PurgeMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "template_cache";

lazy_static! {
    // ============================================================================
    // Lookup Metrics
    // ============================================================================

    /// Renders served from the cache
    pub static ref CACHE_HITS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_hits_total", METRIC_PREFIX),
        "Total renders served from a cached template"
    ).unwrap();

    /// Renders that had to go to the loader
    pub static ref CACHE_MISSES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_misses_total", METRIC_PREFIX),
        "Total renders that missed the cache"
    ).unwrap();

    /// Templates currently cached across all stores
    pub static ref CACHED_TEMPLATES: IntGauge = register_int_gauge!(
        format!("{}_entries", METRIC_PREFIX),
        "Number of templates currently cached"
    ).unwrap();

    // ============================================================================
    // Loader Metrics
    // ============================================================================

    /// Loader calls by outcome (loaded, not_found, error)
    pub static ref LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_loads_total", METRIC_PREFIX),
        "Total template loads by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Purge Metrics
    // ============================================================================

    /// Completed sweep cycles
    pub static ref SWEEPS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweeps_total", METRIC_PREFIX),
        "Total generational sweep cycles"
    ).unwrap();

    /// Sweep cycles that failed
    pub static ref SWEEP_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweep_failures_total", METRIC_PREFIX),
        "Total sweep cycles that failed"
    ).unwrap();

    /// Entries dropped by sweeps
    pub static ref EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_evictions_total", METRIC_PREFIX),
        "Total templates evicted by generational sweeps"
    ).unwrap();

    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Render latency, including any load
    pub static ref RENDER_LATENCY: Histogram = register_histogram!(
        format!("{}_render_latency_seconds", METRIC_PREFIX),
        "Template render latency in seconds",
        vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();
}
