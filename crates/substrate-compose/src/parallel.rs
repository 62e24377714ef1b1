//! `parallelBroadcast`: fan a write out to every child backend
//! concurrently and accept according to an [`AcceptPolicy`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, HealthState, ListOptions, ListResult, ReadMultiOutcome,
    ReadOutcome, ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use tokio_util::sync::CancellationToken;

/// How many children must accept a write for [`ParallelBroadcast`] to
/// report the write as accepted overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptPolicy {
    /// Strictly more than half of the children must accept.
    Majority,
    /// Every child must accept.
    All,
    /// At least one child must accept.
    Any,
}

impl AcceptPolicy {
    fn satisfied(&self, accepted: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        match self {
            Self::Majority => accepted * 2 > total,
            Self::All => accepted == total,
            Self::Any => accepted >= 1,
        }
    }
}

/// A write-fan-out combinator: `receive` is sent to every child backend
/// concurrently, and the aggregate outcome is decided by an
/// [`AcceptPolicy`]. Every other operation is either a best-effort
/// aggregate (`health`, `get_schema`, `cleanup`) or `not-implemented` —
/// this combinator models a write path, not a readable store.
pub struct ParallelBroadcast {
    children: Vec<Arc<dyn Backend>>,
    policy: AcceptPolicy,
}

impl ParallelBroadcast {
    /// Build a broadcaster over `children`, accepting writes per `policy`.
    pub fn new(children: Vec<Arc<dyn Backend>>, policy: AcceptPolicy) -> Self {
        Self { children, policy }
    }
}

fn not_implemented(op: &str) -> SubstrateError {
    SubstrateError::new(
        substrate_error::ErrorKind::NotImplemented,
        format!("parallelBroadcast does not support {op}; it is write-only"),
    )
}

#[async_trait]
impl Backend for ParallelBroadcast {
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        if self.children.is_empty() {
            return ReceiveOutcome::rejected(&SubstrateError::validation_failed(
                "parallelBroadcast has no children to write to",
            ));
        }

        let futures = self
            .children
            .iter()
            .map(|child| child.receive(uri, data.clone(), cancel));
        let outcomes = join_all(futures).await;

        let accepted = outcomes.iter().filter(|o| o.accepted).count();
        let total = outcomes.len();

        if self.policy.satisfied(accepted, total) {
            ReceiveOutcome::accepted()
        } else {
            let first_error = outcomes.iter().find_map(|o| o.error.clone());
            ReceiveOutcome::rejected(&SubstrateError::validation_failed(format!(
                "only {accepted}/{total} children accepted (policy {:?}){}",
                self.policy,
                first_error
                    .map(|e| format!(": {e}"))
                    .unwrap_or_default()
            )))
        }
    }

    async fn read(&self, _uri: &Uri, _cancel: &CancellationToken) -> ReadOutcome {
        ReadOutcome::failed(&not_implemented("read"))
    }

    async fn read_multi(&self, _uris: &[Uri], _cancel: &CancellationToken) -> ReadMultiOutcome {
        ReadMultiOutcome::from_results(vec![])
    }

    async fn list(
        &self,
        _prefix: &Uri,
        options: &ListOptions,
        _cancel: &CancellationToken,
    ) -> ListResult {
        ListResult {
            success: false,
            data: vec![],
            pagination: substrate_backend::Pagination {
                page: options.effective_page(),
                limit: options.effective_limit(),
                total: 0,
            },
            error: Some(not_implemented("list").message),
        }
    }

    async fn delete(&self, _uri: &Uri, _cancel: &CancellationToken) -> DeleteOutcome {
        DeleteOutcome::failed(&not_implemented("delete"))
    }

    async fn health(&self, cancel: &CancellationToken) -> HealthOutcome {
        let futures = self.children.iter().map(|child| child.health(cancel));
        let results = join_all(futures).await;
        let any_healthy = results
            .iter()
            .any(|h| h.status == HealthState::Healthy);
        let details = serde_json::json!({
            "children": results.iter().map(|h| h.status == HealthState::Healthy).collect::<Vec<_>>(),
        });
        if any_healthy {
            HealthOutcome {
                status: HealthState::Healthy,
                message: None,
                details: Some(details),
            }
        } else {
            HealthOutcome {
                status: HealthState::Unhealthy,
                message: Some("no child backend is healthy".into()),
                details: Some(details),
            }
        }
    }

    fn get_schema(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for child in &self.children {
            keys.extend(child.get_schema());
        }
        keys.into_iter().collect()
    }

    async fn cleanup(&self) {
        join_all(self.children.iter().map(|child| child.cleanup())).await;
    }
}
