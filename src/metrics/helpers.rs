//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, IntGauge, TextEncoder};

use super::{
    CACHED_TEMPLATES, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, EVICTIONS_TOTAL, LOADS_TOTAL,
    RENDER_LATENCY, SWEEPS_TOTAL, SWEEP_FAILURES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Outcome label for loader calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    NotFound,
    Error,
}

impl LoadOutcome {
    fn as_label(self) -> &'static str {
        match self {
            LoadOutcome::Loaded => "loaded",
            LoadOutcome::NotFound => "not_found",
            LoadOutcome::Error => "error",
        }
    }
}

/// Helper struct for recording cache metrics
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn record_hit() {
        CACHE_HITS_TOTAL.inc();
    }

    pub fn record_miss() {
        CACHE_MISSES_TOTAL.inc();
    }

    pub fn record_load(outcome: LoadOutcome) {
        LOADS_TOTAL.with_label_values(&[outcome.as_label()]).inc();
    }

    /// Handle to the process-wide cached entry gauge
    pub fn entries_gauge() -> IntGauge {
        CACHED_TEMPLATES.clone()
    }

    pub fn record_render_latency(latency_secs: f64) {
        RENDER_LATENCY.observe(latency_secs);
    }
}

/// Helper struct for recording purge metrics
pub struct PurgeMetrics;

impl PurgeMetrics {
    /// Record a completed sweep and the entries it dropped
    pub fn record_sweep(evicted: usize) {
        SWEEPS_TOTAL.inc();
        if evicted > 0 {
            EVICTIONS_TOTAL.inc_by(evicted as u64);
        }
    }

    pub fn record_failure() {
        SWEEP_FAILURES_TOTAL.inc();
    }
}
