//! Prometheus metrics for the packaging pipeline.
//!
//! This module provides metrics for:
//! - Bundle outcomes and stage durations
//! - Derivative generation and delivery
//! - Metadata registration and completion notifications

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

// =============================================================================
// Bundles
// =============================================================================

/// Bundles processed by final outcome.
pub static BUNDLES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "avpackager_bundles_processed_total",
            "Total bundles processed",
        ),
        &["outcome"], // "completed", "failed"
    )
    .unwrap()
});

/// Bundle directories skipped as malformed.
pub static BUNDLES_MALFORMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "avpackager_bundles_malformed_total",
        "Total bundle directories skipped as malformed",
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "avpackager_stage_duration_seconds",
            "Duration of each bundle processing stage",
        )
        .buckets(vec![
            0.1, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0,
        ]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Derivatives and delivery
// =============================================================================

/// Derivatives generated by class and result.
pub static DERIVATIVES_GENERATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "avpackager_derivatives_generated_total",
            "Total derivative generation attempts",
        ),
        &["class", "result"], // result: "success", kind of failure
    )
    .unwrap()
});

/// Delivery attempts by class and result.
pub static DELIVERY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "avpackager_delivery_attempts_total",
            "Total delivery attempts, retries included",
        ),
        &["class", "result"],
    )
    .unwrap()
});

/// Bytes delivered by class.
pub static BYTES_DELIVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("avpackager_bytes_delivered_total", "Total bytes delivered"),
        &["class"],
    )
    .unwrap()
});

// =============================================================================
// External systems
// =============================================================================

/// Metadata registration attempts by result.
pub static REGISTRATION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "avpackager_registration_attempts_total",
            "Total metadata registration attempts",
        ),
        &["result"],
    )
    .unwrap()
});

/// Completion notifications by result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "avpackager_notifications_total",
            "Total completion notification publish attempts",
        ),
        &["result"], // "published", "unreachable", "rejected"
    )
    .unwrap()
});

/// Returns all metrics for registration with a Prometheus registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Bundles
        Box::new(BUNDLES_PROCESSED.clone()),
        Box::new(BUNDLES_MALFORMED.clone()),
        Box::new(STAGE_DURATION.clone()),
        // Derivatives and delivery
        Box::new(DERIVATIVES_GENERATED.clone()),
        Box::new(DELIVERY_ATTEMPTS.clone()),
        Box::new(BYTES_DELIVERED.clone()),
        // External systems
        Box::new(REGISTRATION_ATTEMPTS.clone()),
        Box::new(NOTIFICATIONS.clone()),
    ]
}

/// Builds a registry holding every pipeline metric.
pub fn registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(registry)
}
