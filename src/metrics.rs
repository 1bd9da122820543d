//! Prometheus metrics for health evaluation
//!
//! - Evaluations by check source and resulting status
//! - Script failures by reason
//! - Script run durations

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Health evaluation metrics registry
///
/// Thread-safe; the collectors are shared handles.
#[derive(Clone)]
pub struct HealthMetrics {
    registry: Registry,
    /// Evaluations by source (script, builtin, none, ignored) and status
    pub evaluations_total: IntCounterVec,
    /// Scripted checks that ended in an error, by reason
    pub script_failures_total: IntCounterVec,
    /// Wall-clock duration of script runs in seconds
    pub script_duration_seconds: Histogram,
}

impl HealthMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let evaluations_total = IntCounterVec::new(
            Opts::new(
                "kubehealth_evaluations_total",
                "Total number of resource health evaluations",
            ),
            &["source", "status"],
        )?;
        registry.register(Box::new(evaluations_total.clone()))?;

        let script_failures_total = IntCounterVec::new(
            Opts::new(
                "kubehealth_script_failures_total",
                "Total number of failed health script runs",
            ),
            &["reason"], // ambiguous, parse, runtime, timeout, invalid_return, unknown_status
        )?;
        registry.register(Box::new(script_failures_total.clone()))?;

        let script_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "kubehealth_script_duration_seconds",
                "Duration of health script runs in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(script_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            evaluations_total,
            script_failures_total,
            script_duration_seconds,
        })
    }

    pub fn record_evaluation(&self, source: &str, status: &str) {
        self.evaluations_total
            .with_label_values(&[source, status])
            .inc();
    }

    pub fn record_script_failure(&self, reason: &str) {
        self.script_failures_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn observe_script_duration(&self, duration_secs: f64) {
        self.script_duration_seconds.observe(duration_secs);
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Shared metrics handle
pub type SharedMetrics = Arc<HealthMetrics>;

pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(HealthMetrics::new()?))
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
