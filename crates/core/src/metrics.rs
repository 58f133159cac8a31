//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Daemon RPC calls (counts by result, latency)
//! - Bulk operations (per-task failures that were collected, not raised)
//! - Daemon notifications seen by subscribers

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Daemon RPC
// =============================================================================

/// RPC calls by method and result.
pub static RPC_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ariaherd_rpc_calls_total", "Total daemon RPC calls"),
        &["method", "result"], // "ok", "daemon_error", "connection_error", "invalid"
    )
    .unwrap()
});

/// RPC call latency in seconds.
pub static RPC_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ariaherd_rpc_duration_seconds",
            "Duration of daemon RPC calls",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["method"],
    )
    .unwrap()
});

// =============================================================================
// Orchestration
// =============================================================================

/// Per-task failures inside best-effort bulk operations.
pub static BATCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ariaherd_batch_failures_total",
            "Per-task failures collected by bulk operations",
        ),
        &["operation"], // "remove_all", "change_option"
    )
    .unwrap()
});

/// Daemon notifications by kind.
pub static DAEMON_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ariaherd_daemon_events_total", "Daemon notifications received"),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RPC_CALLS.clone()),
        Box::new(RPC_DURATION.clone()),
        Box::new(BATCH_FAILURES.clone()),
        Box::new(DAEMON_EVENTS.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        RPC_CALLS.with_label_values(&["aria2.tellActive", "ok"]).inc();
        RPC_DURATION
            .with_label_values(&["aria2.tellActive"])
            .observe(0.01);
        BATCH_FAILURES.with_label_values(&["remove_all"]).inc();
        DAEMON_EVENTS.with_label_values(&["download_complete"]).inc();

        let output = encode_metrics();
        assert!(output.contains("ariaherd_rpc_calls_total"));
        assert!(output.contains("ariaherd_rpc_duration_seconds"));
        assert!(output.contains("ariaherd_batch_failures_total"));
        assert!(output.contains("ariaherd_daemon_events_total"));
        assert!(output.contains("# HELP"));
    }

    #[test]
    fn test_all_metrics_register_in_fresh_registry() {
        let registry = Registry::new();
        for metric in all_metrics() {
            assert!(registry.register(metric).is_ok());
        }
    }
}
