// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The in-memory reference [`Backend`]: a map-backed store behind a
//! reader-writer lock, with scheme semantics (overwrite-in-place,
//! first-write-wins, content-addressed dedup) enforced at the storage
//! layer and program validation delegated to [`substrate_validate`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use substrate_backend::{
    Backend, DeleteOutcome, HealthOutcome, ListEntry, ListOptions, ListResult, Pagination,
    ReadMultiOutcome, ReadOutcome, ReceiveOutcome, Reader, SortBy, SortOrder, StoredRecord,
};
use substrate_core::record::PayloadValue;
use substrate_core::uri::{Scheme, Uri};
use substrate_error::SubstrateError;
use substrate_validate::{SchemaRegistry, Validator};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// An in-memory, process-local backend. Construction takes the
/// [`Validator`] (typically `schema(registry)` or `msg_schema(registry)`)
/// and the [`SchemaRegistry`] it closes over, so [`Backend::get_schema`]
/// can report the registry's program keys without duplicating state.
pub struct MemoryBackend {
    store: RwLock<BTreeMap<String, StoredRecord>>,
    validator: Validator,
    registry: Arc<SchemaRegistry>,
}

impl MemoryBackend {
    /// Construct an empty backend validating writes against `validator`,
    /// built from `registry`.
    pub fn new(validator: Validator, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            store: RwLock::new(BTreeMap::new()),
            validator,
            registry,
        }
    }

    async fn read_locked(&self, uri: &Uri) -> ReadOutcome {
        let store = self.store.read().await;
        match store.get(uri.as_str()) {
            Some(record) => ReadOutcome::found(StoredRecord {
                ts: record.ts,
                data: record.data.clone(),
            }),
            None => ReadOutcome::not_found(uri),
        }
    }
}

/// Digest of the data already stored at `uri`, if any, using the same
/// content-digest function the validator uses to check declared digests.
fn existing_digest(existing: &PayloadValue) -> String {
    substrate_crypto::content_digest_hex(existing)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome {
        if cancel.is_cancelled() {
            return ReceiveOutcome::rejected(&SubstrateError::new(
                substrate_error::ErrorKind::Cancelled,
                "receive cancelled before validation",
            ));
        }

        let outcome = self.validator.validate(uri, &data, self, cancel).await;
        if !outcome.valid {
            let err = outcome
                .error
                .unwrap_or_else(|| SubstrateError::validation_failed("rejected by validator"));
            return ReceiveOutcome::rejected(&err);
        }

        let scheme = uri.scheme();
        let mut store = self.store.write().await;

        if scheme.is_first_write_wins() {
            if let Some(existing) = store.get(uri.as_str()) {
                if matches!(scheme, Scheme::Hash | Scheme::Blob)
                    && existing_digest(&existing.data) == existing_digest(&data)
                {
                    return ReceiveOutcome::duplicate();
                }
                let kind = if matches!(scheme, Scheme::Hash | Scheme::Blob) {
                    substrate_error::ErrorKind::Exists
                } else {
                    substrate_error::ErrorKind::Immutable
                };
                return ReceiveOutcome::rejected(&SubstrateError::new(
                    kind,
                    format!("{uri} already holds a record and cannot be overwritten"),
                ));
            }
        }

        store.insert(
            uri.as_str().to_string(),
            StoredRecord {
                ts: Utc::now(),
                data,
            },
        );
        ReceiveOutcome::accepted()
    }

    async fn read(&self, uri: &Uri, _cancel: &CancellationToken) -> ReadOutcome {
        self.read_locked(uri).await
    }

    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        if uris.len() > substrate_backend::MAX_READ_MULTI {
            let as_strings: Vec<String> = uris.iter().map(|u| u.as_str().to_string()).collect();
            return ReadMultiOutcome::too_many(&as_strings);
        }
        let store = self.store.read().await;
        let mut results = Vec::with_capacity(uris.len());
        for uri in uris {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = match store.get(uri.as_str()) {
                Some(record) => ReadOutcome::found(StoredRecord {
                    ts: record.ts,
                    data: record.data.clone(),
                }),
                None => ReadOutcome::not_found(uri),
            };
            results.push((uri.as_str().to_string(), outcome));
        }
        ReadMultiOutcome::from_results(results)
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        _cancel: &CancellationToken,
    ) -> ListResult {
        let store = self.store.read().await;
        let mut matches: Vec<(&String, &StoredRecord)> = store
            .iter()
            .filter(|(uri_str, _)| {
                uri_str.starts_with(prefix.as_str())
                    && options
                        .pattern
                        .as_ref()
                        .is_none_or(|p| uri_str.contains(p.as_str()))
            })
            .collect();

        match (options.sort_by, options.sort_order) {
            (SortBy::Name, SortOrder::Asc) => matches.sort_by(|a, b| a.0.cmp(b.0)),
            (SortBy::Name, SortOrder::Desc) => matches.sort_by(|a, b| b.0.cmp(a.0)),
            (SortBy::Timestamp, SortOrder::Asc) => matches.sort_by(|a, b| a.1.ts.cmp(&b.1.ts)),
            (SortBy::Timestamp, SortOrder::Desc) => matches.sort_by(|a, b| b.1.ts.cmp(&a.1.ts)),
        }

        let total = matches.len();
        let limit = options.effective_limit() as usize;
        let page = options.effective_page() as usize;
        let start = (page - 1) * limit;
        let data = matches
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|(uri_str, _)| ListEntry {
                uri: uri_str.clone(),
            })
            .collect();

        ListResult {
            success: true,
            data,
            pagination: Pagination {
                page: options.effective_page(),
                limit: options.effective_limit(),
                total,
            },
            error: None,
        }
    }

    async fn delete(&self, uri: &Uri, _cancel: &CancellationToken) -> DeleteOutcome {
        let mut store = self.store.write().await;
        match store.remove(uri.as_str()) {
            Some(_) => DeleteOutcome::deleted(),
            None => DeleteOutcome::failed(&SubstrateError::not_found(format!(
                "no record at {uri} to delete"
            ))),
        }
    }

    async fn health(&self, _cancel: &CancellationToken) -> HealthOutcome {
        HealthOutcome::healthy()
    }

    fn get_schema(&self) -> Vec<String> {
        self.registry.program_keys()
    }

    async fn cleanup(&self) {
        self.store.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substrate_validate::schema;

    fn backend() -> MemoryBackend {
        let registry = SchemaRegistry::builder()
            .open_program_key("mutable://open")
            .open_program_key("blob://open")
            .open_program_key("immutable://open")
            .build();
        MemoryBackend::new(schema(registry.clone()), registry)
    }

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn receive_then_read_roundtrips() {
        let backend = backend();
        let uri = Uri::parse("mutable://open/k").unwrap();
        let value = PayloadValue::Json(serde_json::json!({"a": 1}));
        let outcome = backend.receive(&uri, value.clone(), &cancel()).await;
        assert!(outcome.accepted);

        let read = backend.read(&uri, &cancel()).await;
        assert!(read.success);
        assert_eq!(read.record.unwrap().data, value);
    }

    #[tokio::test]
    async fn mutable_scheme_overwrites_in_place() {
        let backend = backend();
        let uri = Uri::parse("mutable://open/k").unwrap();
        backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel())
            .await;
        let outcome = backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(2)), &cancel())
            .await;
        assert!(outcome.accepted);
        let read = backend.read(&uri, &cancel()).await;
        assert_eq!(read.record.unwrap().data, PayloadValue::Json(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn immutable_scheme_rejects_second_write() {
        let backend = backend();
        let uri = Uri::parse("immutable://open/k").unwrap();
        backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel())
            .await;
        let outcome = backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(2)), &cancel())
            .await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.error_kind, Some(substrate_error::ErrorKind::Immutable));
    }

    #[tokio::test]
    async fn blob_scheme_dedupes_identical_content_as_duplicate() {
        let backend = backend();
        let digest = substrate_crypto::sha256_hex(b"hello");
        let uri = Uri::parse(&format!("blob://open/sha256:{digest}")).unwrap();
        let value = PayloadValue::Binary(b"hello".to_vec());
        let first = backend.receive(&uri, value.clone(), &cancel()).await;
        assert!(first.accepted);
        assert!(!first.duplicate);
        let second = backend.receive(&uri, value, &cancel()).await;
        assert!(second.accepted);
        assert!(second.duplicate);
    }

    #[tokio::test]
    async fn blob_scheme_rejects_mismatched_digest() {
        let backend = backend();
        let digest = substrate_crypto::sha256_hex(b"hello");
        let uri = Uri::parse(&format!("blob://open/sha256:{digest}")).unwrap();
        let value = PayloadValue::Binary(b"not hello".to_vec());
        let outcome = backend.receive(&uri, value, &cancel()).await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.error_kind, Some(substrate_error::ErrorKind::HashMismatch));
    }

    #[tokio::test]
    async fn unknown_program_rejected() {
        let registry = SchemaRegistry::builder().build();
        let backend = MemoryBackend::new(schema(registry.clone()), registry);
        let uri = Uri::parse("mutable://closed/k").unwrap();
        let outcome = backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel())
            .await;
        assert!(!outcome.accepted);
        assert_eq!(
            outcome.error_kind,
            Some(substrate_error::ErrorKind::UnknownProgram)
        );
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let backend = backend();
        for i in 0..5 {
            let uri = Uri::parse(&format!("mutable://open/k{i}")).unwrap();
            backend
                .receive(&uri, PayloadValue::Json(serde_json::json!(i)), &cancel())
                .await;
        }
        let prefix = Uri::parse("mutable://open").unwrap();
        let options = ListOptions {
            page: 2,
            limit: 2,
            ..Default::default()
        };
        let result = backend.list(&prefix, &options, &cancel()).await;
        assert!(result.success);
        assert_eq!(result.pagination.total, 5);
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data[0].uri, "mutable://open/k2");
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let backend = backend();
        let uri = Uri::parse("mutable://open/k").unwrap();
        backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel())
            .await;
        let outcome = backend.delete(&uri, &cancel()).await;
        assert!(outcome.success);
        assert!(!backend.read(&uri, &cancel()).await.success);
    }

    #[tokio::test]
    async fn delete_missing_record_fails_not_found() {
        let backend = backend();
        let uri = Uri::parse("mutable://open/missing").unwrap();
        let outcome = backend.delete(&uri, &cancel()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(substrate_error::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn get_schema_reports_registry_program_keys() {
        let backend = backend();
        let keys = backend.get_schema();
        assert!(keys.contains(&"mutable://open".to_string()));
    }

    #[tokio::test]
    async fn cleanup_clears_store() {
        let backend = backend();
        let uri = Uri::parse("mutable://open/k").unwrap();
        backend
            .receive(&uri, PayloadValue::Json(serde_json::json!(1)), &cancel())
            .await;
        backend.cleanup().await;
        assert!(!backend.read(&uri, &cancel()).await.success);
    }

    #[tokio::test]
    async fn health_is_always_healthy_for_memory_backend() {
        let backend = backend();
        assert_eq!(
            backend.health(&cancel()).await.status,
            substrate_backend::HealthState::Healthy
        );
    }
}
