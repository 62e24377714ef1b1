//! A thin `Backend` adapter over a SQL connection string.
//!
//! Per SPEC_FULL §4.8, the *interface* is in scope here but the wire-level
//! driver integration is not: every operation but `health`/`get_schema`/
//! `cleanup` returns `not-implemented`.

use async_trait::async_trait;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, ListOptions, ListResult, ReadMultiOutcome, ReadOutcome,
    ReceiveOutcome,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::{ErrorKind, SubstrateError};
use tokio_util::sync::CancellationToken;

fn not_implemented(op: &str) -> SubstrateError {
    SubstrateError::new(ErrorKind::NotImplemented, format!("SqlBackend does not implement {op}"))
}

/// A `Backend` whose storage is (nominally) a SQL database. Holds only a
/// connection string; no driver is wired up.
pub struct SqlBackend {
    connection_string: String,
}

impl SqlBackend {
    /// Build a backend over `connection_string`. Does not connect.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    /// The configured connection string.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[async_trait]
impl Backend for SqlBackend {
    async fn receive(&self, _uri: &Uri, _data: PayloadValue, _cancel: &CancellationToken) -> ReceiveOutcome {
        ReceiveOutcome::rejected(&not_implemented("receive"))
    }

    async fn read(&self, _uri: &Uri, _cancel: &CancellationToken) -> ReadOutcome {
        ReadOutcome::failed(&not_implemented("read"))
    }

    async fn read_multi(&self, uris: &[Uri], _cancel: &CancellationToken) -> ReadMultiOutcome {
        let err = not_implemented("readMulti");
        ReadMultiOutcome::from_results(
            uris.iter()
                .map(|u| (u.as_str().to_string(), ReadOutcome::failed(&err)))
                .collect(),
        )
    }

    async fn list(&self, _prefix: &Uri, options: &ListOptions, _cancel: &CancellationToken) -> ListResult {
        ListResult {
            success: false,
            data: Vec::new(),
            pagination: substrate_backend::Pagination {
                page: options.page,
                limit: options.limit,
                total: 0,
            },
            error: Some(not_implemented("list").message),
        }
    }

    async fn delete(&self, _uri: &Uri, _cancel: &CancellationToken) -> DeleteOutcome {
        DeleteOutcome::failed(&not_implemented("delete"))
    }

    async fn health(&self, _cancel: &CancellationToken) -> HealthOutcome {
        HealthOutcome::unhealthy("SqlBackend has no driver wired up")
    }

    fn get_schema(&self) -> Vec<String> {
        Vec::new()
    }

    async fn cleanup(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_operation_reports_not_implemented_or_unhealthy() {
        let backend = SqlBackend::new("postgres://localhost/substrate");
        let cancel = CancellationToken::new();
        let uri = Uri::parse("mutable://open/k").unwrap();

        assert_eq!(
            backend
                .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel)
                .await
                .error_kind,
            Some(ErrorKind::NotImplemented)
        );
        assert_eq!(
            backend.read(&uri, &cancel).await.error_kind,
            Some(ErrorKind::NotImplemented)
        );
        assert_eq!(backend.health(&cancel).await.status, substrate_backend::HealthState::Unhealthy);
        assert_eq!(backend.connection_string(), "postgres://localhost/substrate");
    }
}
