//! `firstMatchSequence`: read fallback over an ordered list of backends —
//! try each in turn, stop at the first that has the value.

use std::sync::Arc;

use async_trait::async_trait;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, HealthState, ListOptions, ListResult, ReadMultiOutcome,
    ReadOutcome, ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::{ErrorKind, SubstrateError};
use tokio_util::sync::CancellationToken;

/// A read-only failover combinator: `read` tries each backend in order,
/// falling through on `not-found` or `transport` errors and returning as
/// soon as one backend has the value. If no backend has it, the last
/// `not-found` is returned so callers still see a `not-found` rather than
/// a generic failure.
pub struct FirstMatchSequence {
    children: Vec<Arc<dyn Backend>>,
}

impl FirstMatchSequence {
    /// Build a sequence trying `children` in order.
    pub fn new(children: Vec<Arc<dyn Backend>>) -> Self {
        Self { children }
    }

    fn falls_through(kind: ErrorKind) -> bool {
        matches!(kind, ErrorKind::NotFound | ErrorKind::Transport | ErrorKind::Timeout)
    }
}

fn not_implemented(op: &str) -> SubstrateError {
    SubstrateError::new(
        ErrorKind::NotImplemented,
        format!("firstMatchSequence does not support {op}; it is read-only"),
    )
}

#[async_trait]
impl Backend for FirstMatchSequence {
    async fn receive(
        &self,
        _uri: &Uri,
        _data: PayloadValue,
        _cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        ReceiveOutcome::rejected(&not_implemented("receive"))
    }

    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome {
        let mut last = ReadOutcome::not_found(uri);
        for child in &self.children {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = child.read(uri, cancel).await;
            if outcome.success {
                return outcome;
            }
            let should_continue = outcome
                .error_kind
                .map(Self::falls_through)
                .unwrap_or(true);
            last = outcome;
            if !should_continue {
                return last;
            }
        }
        last
    }

    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        if uris.len() > substrate_backend::MAX_READ_MULTI {
            let as_strings: Vec<String> = uris.iter().map(|u| u.as_str().to_string()).collect();
            return ReadMultiOutcome::too_many(&as_strings);
        }
        let mut results = Vec::with_capacity(uris.len());
        for uri in uris {
            if cancel.is_cancelled() {
                break;
            }
            results.push((uri.as_str().to_string(), self.read(uri, cancel).await));
        }
        ReadMultiOutcome::from_results(results)
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult {
        for child in &self.children {
            let result = child.list(prefix, options, cancel).await;
            if result.success {
                return result;
            }
        }
        ListResult {
            success: false,
            data: vec![],
            pagination: substrate_backend::Pagination {
                page: options.effective_page(),
                limit: options.effective_limit(),
                total: 0,
            },
            error: Some("no child backend in the sequence answered list successfully".into()),
        }
    }

    async fn delete(&self, _uri: &Uri, _cancel: &CancellationToken) -> DeleteOutcome {
        DeleteOutcome::failed(&not_implemented("delete"))
    }

    async fn health(&self, cancel: &CancellationToken) -> HealthOutcome {
        for child in &self.children {
            let h = child.health(cancel).await;
            if h.status == HealthState::Healthy {
                return h;
            }
        }
        HealthOutcome::unhealthy("no child backend in the sequence is healthy")
    }

    fn get_schema(&self) -> Vec<String> {
        self.children
            .first()
            .map(|c| c.get_schema())
            .unwrap_or_default()
    }

    async fn cleanup(&self) {
        for child in &self.children {
            child.cleanup().await;
        }
    }
}
