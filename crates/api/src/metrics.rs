//! Request and error counters with Prometheus text exposition

use metrics::{counter, describe_counter, Counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};

pub const REQUESTS_TOTAL: &str = "predict_requests_total";
pub const ERRORS_TOTAL: &str = "predict_errors_total";

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
}

/// Counters owned by one gateway instance.
///
/// Uses a private Prometheus recorder rather than the global one, so several
/// gateways (tests, embedded use) never share counts.
pub struct GatewayMetrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    requests_counter: Counter,
    errors_counter: Counter,
    handle: PrometheusHandle,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let (requests_counter, errors_counter) = metrics::with_local_recorder(&recorder, || {
            describe_counter!(REQUESTS_TOTAL, "Total prediction requests");
            describe_counter!(ERRORS_TOTAL, "Total failed prediction requests");
            (counter!(REQUESTS_TOTAL), counter!(ERRORS_TOTAL))
        });
        // Register both series so a fresh process exposes zeros.
        requests_counter.increment(0);
        errors_counter.increment(0);

        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            requests_counter,
            errors_counter,
            handle,
        }
    }

    /// Count one received prediction request
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_counter.increment(1);
    }

    /// Count one failed prediction request
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        self.errors_counter.increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of both counters
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
