//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Inbound federation
    pub static ref ACTIVITIES_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_activities_received_total", "Total number of inbound activities"),
        &["activity_type", "outcome"]
    ).expect("metric can be created");

    // Outbound federation
    pub static ref DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_deliveries_total", "Total number of outbound delivery attempts"),
        &["status"]
    ).expect("metric can be created");
    pub static ref DELIVERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "fedgate_delivery_duration_seconds",
            "Outbound delivery duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"]
    ).expect("metric can be created");

    // Discovery cache
    pub static ref DISCOVERY_CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_discovery_cache_hits_total", "Total number of discovery cache hits"),
        &["result"]
    ).expect("metric can be created");
    pub static ref DISCOVERY_CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("fedgate_discovery_cache_size", "Current number of cached endpoint resolutions"),
        &["state"]
    ).expect("metric can be created");

    // Errors
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedgate_errors_total", "Total number of errors by type"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Register all metrics with the global registry
///
/// Must be called once at startup before the first scrape.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVITIES_RECEIVED_TOTAL.clone()),
        Box::new(DELIVERIES_TOTAL.clone()),
        Box::new(DELIVERY_DURATION_SECONDS.clone()),
        Box::new(DISCOVERY_CACHE_HITS_TOTAL.clone()),
        Box::new(DISCOVERY_CACHE_SIZE.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            // Re-registration happens when tests build multiple app states.
            tracing::debug!(error = %e, "Metric already registered");
        }
    }
}
