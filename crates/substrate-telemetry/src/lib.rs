// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! substrate-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Structured metrics collection for the persistence substrate: one
//! [`OperationMetrics`] record per `receive`/`read`/`list`/... call, an
//! in-process [`MetricsCollector`] that aggregates them, and a
//! [`TelemetryExporter`] trait for shipping a [`MetricsSummary`] elsewhere.
//! Gated behind `SubstrateConfig::metrics_enabled`; when disabled, callers
//! simply don't construct a collector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// OperationMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single backend operation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationMetrics {
    /// Which of the nine protocol operations this call was
    /// (`"receive"`, `"read"`, `"list"`, ...).
    pub operation: String,
    /// Identifies which backend/combinator served the call (e.g.
    /// `"memory"`, `"parallel-broadcast"`, a peer's base URL).
    pub backend_name: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// `true` if the operation's own success flag (`accepted`/`success`)
    /// was `true`.
    pub succeeded: bool,
    /// The error kind, when `succeeded` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

// ---------------------------------------------------------------------------
// MetricsSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across multiple recorded operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of operations recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Fraction of recorded operations that did not succeed.
    pub error_rate: f64,
    /// Per-operation-kind counts (deterministic ordering).
    pub operation_counts: BTreeMap<String, usize>,
    /// Per-backend counts (deterministic ordering).
    pub backend_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            error_rate: 0.0,
            operation_counts: BTreeMap::new(),
            backend_counts: BTreeMap::new(),
        }
    }
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for operation metrics.
///
/// Wrap in an `Arc` (or clone — the inner storage is already behind a
/// `Mutex`) to share across the daemon's request handlers.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<OperationMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record a completed operation's metrics.
    pub fn record(&self, metrics: OperationMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded operation metrics.
    pub fn operations(&self) -> Vec<OperationMetrics> {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.clone()
    }

    /// Number of operations recorded so far.
    pub fn len(&self) -> usize {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.len()
    }

    /// Whether the collector has recorded nothing yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded operations.
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let failures = data.iter().filter(|r| !r.succeeded).count();
        let error_rate = failures as f64 / count as f64;

        let mut operation_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut backend_counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in data.iter() {
            *operation_counts.entry(r.operation.clone()).or_insert(0) += 1;
            *backend_counts.entry(r.backend_name.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            error_rate,
            operation_counts,
            backend_counts,
        }
    }

    /// Clear all recorded metrics.
    pub fn clear(&self) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.clear();
    }
}

// ---------------------------------------------------------------------------
// TelemetrySpan
// ---------------------------------------------------------------------------

/// A structured span for tracing integration, emitted around a single
/// backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySpan {
    /// Span name / operation.
    pub name: String,
    /// Arbitrary key-value attributes (deterministic ordering).
    pub attributes: BTreeMap<String, String>,
}

impl TelemetrySpan {
    /// Create a new span with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Insert an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Emit the span via `tracing::info!`.
    pub fn emit(&self) {
        info!(
            span_name = %self.name,
            attributes = ?self.attributes,
            "telemetry_span"
        );
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Trait for exporting a collected [`MetricsSummary`] somewhere (a log
/// line, a file, a remote collector).
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample(operation: &str, backend: &str, duration: u64, succeeded: bool) -> OperationMetrics {
        OperationMetrics {
            operation: operation.to_string(),
            backend_name: backend.to_string(),
            duration_ms: duration,
            succeeded,
            error_kind: if succeeded { None } else { Some("not-found".to_string()) },
        }
    }

    #[test]
    fn collector_new_is_empty() {
        let c = MetricsCollector::new();
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn collector_record_and_len() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "memory", 1, true));
        assert_eq!(c.len(), 1);
        assert!(!c.is_empty());
    }

    #[test]
    fn collector_operations_returns_all_in_order() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "a", 10, true));
        c.record(sample("read", "b", 20, true));
        let ops = c.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation, "receive");
        assert_eq!(ops[1].operation, "read");
    }

    #[test]
    fn collector_clear() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "x", 50, true));
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn empty_collector_summary() {
        let s = MetricsCollector::new().summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_duration_ms, 0.0);
        assert_eq!(s.error_rate, 0.0);
        assert!(s.operation_counts.is_empty());
        assert!(s.backend_counts.is_empty());
    }

    #[test]
    fn single_operation_summary_matches() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "memory", 42, true));
        let s = c.summary();
        assert_eq!(s.count, 1);
        assert_eq!(s.mean_duration_ms, 42.0);
        assert_eq!(s.p50_duration_ms, 42.0);
        assert_eq!(s.p99_duration_ms, 42.0);
        assert_eq!(s.error_rate, 0.0);
        assert_eq!(s.backend_counts["memory"], 1);
        assert_eq!(s.operation_counts["receive"], 1);
    }

    #[test]
    fn summary_mean_duration() {
        let c = MetricsCollector::new();
        for d in [100, 200, 300] {
            c.record(sample("read", "a", d, true));
        }
        let s = c.summary();
        assert!((s.mean_duration_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p50_odd_count() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40, 50] {
            c.record(sample("read", "a", d, true));
        }
        assert!((c.summary().p50_duration_ms - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p50_even_count() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40] {
            c.record(sample("read", "a", d, true));
        }
        assert!((c.summary().p50_duration_ms - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_p99() {
        let c = MetricsCollector::new();
        for d in 1..=100 {
            c.record(sample("read", "a", d, true));
        }
        let s = c.summary();
        assert!(s.p99_duration_ms > 98.0);
        assert!(s.p99_duration_ms <= 100.0);
    }

    #[test]
    fn summary_error_rate() {
        let c = MetricsCollector::new();
        c.record(sample("read", "a", 10, false));
        c.record(sample("read", "a", 20, true));
        c.record(sample("read", "a", 30, false));
        let s = c.summary();
        assert!((s.error_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn summary_operation_and_backend_counts() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "alpha", 10, true));
        c.record(sample("read", "beta", 20, true));
        c.record(sample("receive", "alpha", 30, true));
        let s = c.summary();
        assert_eq!(s.backend_counts["alpha"], 2);
        assert_eq!(s.backend_counts["beta"], 1);
        assert_eq!(s.operation_counts["receive"], 2);
        assert_eq!(s.operation_counts["read"], 1);
    }

    #[test]
    fn operation_metrics_serde_roundtrip() {
        let m = sample("list", "memory", 5, false);
        let json = serde_json::to_string(&m).unwrap();
        let m2: OperationMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(m, m2);
    }

    #[test]
    fn metrics_summary_serde_roundtrip() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "a", 50, false));
        let s = c.summary();
        let json = serde_json::to_string(&s).unwrap();
        let s2: MetricsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }

    #[test]
    fn concurrent_recording() {
        let c = MetricsCollector::new();
        let mut handles = vec![];
        for i in 0..10 {
            let cc = c.clone();
            handles.push(thread::spawn(move || {
                cc.record(sample("receive", "thread", i * 10, true));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), 10);
    }

    #[test]
    fn telemetry_span_attributes() {
        let span = TelemetrySpan::new("receive")
            .with_attribute("uri", "mutable://open/k")
            .with_attribute("backend", "memory");
        assert_eq!(span.name, "receive");
        assert_eq!(span.attributes.len(), 2);
        assert_eq!(span.attributes["uri"], "mutable://open/k");
    }

    #[test]
    fn telemetry_span_serde_roundtrip() {
        let span = TelemetrySpan::new("read").with_attribute("backend", "memory");
        let json = serde_json::to_string(&span).unwrap();
        let span2: TelemetrySpan = serde_json::from_str(&json).unwrap();
        assert_eq!(span2.name, "read");
        assert_eq!(span2.attributes["backend"], "memory");
    }

    #[test]
    fn json_exporter_valid_output() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "memory", 100, true));
        let exporter = JsonExporter;
        let json = exporter.export(&c.summary()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn json_exporter_backend_counts_deterministic() {
        let c = MetricsCollector::new();
        c.record(sample("receive", "zebra", 10, true));
        c.record(sample("receive", "alpha", 20, true));
        let json = JsonExporter.export(&c.summary()).unwrap();
        let keys_start = json.find("\"alpha\"").unwrap();
        let keys_end = json.find("\"zebra\"").unwrap();
        assert!(keys_start < keys_end);
    }

    #[test]
    fn percentile_empty() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn percentile_single() {
        assert_eq!(percentile(&[42], 99.0), 42.0);
    }
}
