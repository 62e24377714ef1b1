// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! HTTP and WebSocket frontends over a composed [`substrate_backend::Backend`].
//!
//! Both frontends are alternate transports over identical semantics: they
//! share one backend instance (`AppState::backend`) rather than each
//! re-implementing the protocol.

mod http;
mod middleware;
mod validation;
mod ws;

pub use http::build_router;
pub use middleware::{request_id_middleware, CorsConfig, RateLimiter, RequestId, RequestLogger};
pub use validation::validate_receive_body;

use std::sync::Arc;
use substrate_backend::Backend;
use substrate_telemetry::MetricsCollector;
use tokio_util::sync::CancellationToken;

/// Default per-operation timeout budget from spec §5: 30s for point
/// operations, surfaced here so handlers can build a fresh
/// [`CancellationToken`] deadline per request without importing `substrate_core`.
pub const POINT_OP_TIMEOUT_SECS: u64 = 30;

/// `list` gets a longer timeout budget.
pub const LIST_TIMEOUT_SECS: u64 = 60;

/// Shared state behind every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    /// The composed backend this node serves. Usually a
    /// `ValidatedClient` wrapping a `ParallelBroadcast` write side and a
    /// `FirstMatchSequence` read side, but any `Backend` works.
    pub backend: Arc<dyn Backend>,
    /// Optional metrics collector; `None` when `metricsEnabled` is off.
    pub metrics: Option<MetricsCollector>,
}

impl AppState {
    /// Wrap a backend with no metrics collection.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            metrics: None,
        }
    }

    /// Wrap a backend with a metrics collector attached.
    pub fn with_metrics(backend: Arc<dyn Backend>, metrics: MetricsCollector) -> Self {
        Self {
            backend,
            metrics: Some(metrics),
        }
    }

    /// Record one operation's outcome, if metrics are enabled.
    pub(crate) fn record(&self, operation: &str, duration_ms: u64, succeeded: bool, error_kind: Option<&str>) {
        if let Some(ref collector) = self.metrics {
            collector.record(substrate_telemetry::OperationMetrics {
                operation: operation.to_string(),
                backend_name: "composite".to_string(),
                duration_ms,
                succeeded,
                error_kind: error_kind.map(str::to_string),
            });
        }
    }

    /// A fresh cancellation token for one request. Every handler cancels it
    /// once the request's timeout elapses (see `http::with_timeout`).
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}
