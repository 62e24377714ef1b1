// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The uniform backend protocol: nine operations every storage
//! implementation, combinator, and frontend agree on.
//!
//! [`Backend`] is the one capability type every in-memory store, SQL/doc
//! adapter, HTTP/WebSocket peer, and combinator implements. Validators take
//! a narrower [`Reader`] so they can look but never write, making the
//! "validators must not call receive" constraint a type-level fact instead
//! of a convention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_error::SubstrateError;
use tokio_util::sync::CancellationToken;

/// `readMulti` accepts at most this many URIs per call.
pub const MAX_READ_MULTI: usize = 50;

/// Default `list` page size when the caller doesn't specify one.
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Hard cap on `list` page size regardless of what the caller requests.
pub const MAX_LIST_LIMIT: u32 = 500;

// ---------------------------------------------------------------------------
// receive
// ---------------------------------------------------------------------------

/// The result of a `receive([uri, data])` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveOutcome {
    /// `true` if the record was durably stored (or, for composite
    /// backends, accepted per the combinator's policy).
    pub accepted: bool,
    /// Present when `accepted` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error kind backing `error`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<substrate_error::ErrorKind>,
    /// `true` if a content-addressed write deduped against an existing
    /// identical record rather than writing a new one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

impl ReceiveOutcome {
    /// A plain accept, with no duplicate indication.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            error: None,
            error_kind: None,
            duplicate: false,
        }
    }

    /// An accept that deduped against an existing identical record.
    pub fn duplicate() -> Self {
        Self {
            accepted: true,
            error: None,
            error_kind: None,
            duplicate: true,
        }
    }

    /// A rejection carrying the causing error.
    pub fn rejected(err: &SubstrateError) -> Self {
        Self {
            accepted: false,
            error: Some(err.message.clone()),
            error_kind: Some(err.kind),
            duplicate: false,
        }
    }
}

// ---------------------------------------------------------------------------
// read
// ---------------------------------------------------------------------------

/// A stored record plus the timestamp it was written at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// When the record was written.
    pub ts: DateTime<Utc>,
    /// The record's payload.
    pub data: PayloadValue,
}

/// The result of a `read(uri)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOutcome {
    /// `true` iff a record was found.
    pub success: bool,
    /// Present when `success` is `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<StoredRecord>,
    /// Present when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error kind backing `error`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<substrate_error::ErrorKind>,
}

impl ReadOutcome {
    /// A successful read.
    pub fn found(record: StoredRecord) -> Self {
        Self {
            success: true,
            record: Some(record),
            error: None,
            error_kind: None,
        }
    }

    /// A failed read, carrying the causing error.
    pub fn failed(err: &SubstrateError) -> Self {
        Self {
            success: false,
            record: None,
            error: Some(err.message.clone()),
            error_kind: Some(err.kind),
        }
    }

    /// Shorthand for a `not-found` failure.
    pub fn not_found(uri: &Uri) -> Self {
        Self::failed(&SubstrateError::not_found(format!("no record at {uri}")))
    }
}

/// The aggregate result of a `readMulti(uris)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMultiOutcome {
    /// `true` iff at least one child `read` succeeded.
    pub success: bool,
    /// Per-URI results, in the same order as the input.
    pub results: Vec<(String, ReadOutcome)>,
    /// Total URIs requested.
    pub total: usize,
    /// URIs that resolved successfully.
    pub succeeded: usize,
    /// URIs that did not resolve.
    pub failed: usize,
}

impl ReadMultiOutcome {
    /// Build the aggregate from per-URI outcomes, in input order.
    pub fn from_results(results: Vec<(String, ReadOutcome)>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|(_, r)| r.success).count();
        Self {
            success: succeeded > 0,
            failed: total - succeeded,
            succeeded,
            total,
            results,
        }
    }

    /// The `validation-failed` aggregate returned when the caller exceeds
    /// [`MAX_READ_MULTI`]. Every input URI gets a matching error result so
    /// callers can still rely on "same length as input".
    pub fn too_many(uris: &[String]) -> Self {
        let err = SubstrateError::validation_failed(format!(
            "readMulti accepts at most {MAX_READ_MULTI} uris, got {}",
            uris.len()
        ));
        let results = uris
            .iter()
            .map(|u| (u.clone(), ReadOutcome::failed(&err)))
            .collect();
        Self::from_results(results)
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

/// Sort key for `list` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    /// Lexicographic order on the URI string.
    Name,
    /// Order by record timestamp.
    Timestamp,
}

/// Sort direction for `list` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Options governing a `list(uri, options)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOptions {
    /// 1-based page number.
    pub page: u32,
    /// Page size, capped at [`MAX_LIST_LIMIT`] by every implementation.
    pub limit: u32,
    /// Optional substring filter applied to the URI.
    pub pattern: Option<String>,
    /// Sort key.
    pub sort_by: SortBy,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIST_LIMIT,
            pattern: None,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Asc,
        }
    }
}

impl ListOptions {
    /// `limit`, clamped to [`MAX_LIST_LIMIT`] and floored at 1.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }

    /// `page`, floored at 1.
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }
}

/// A single entry in a `list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    /// The child URI.
    pub uri: String,
}

/// Pagination metadata echoed back with a `list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// The page returned (1-based).
    pub page: u32,
    /// The page size used.
    pub limit: u32,
    /// Total matching entries across all pages.
    pub total: usize,
}

/// The result of a `list(uri, options)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    /// `true` unless the backend itself errored (an empty page is still a
    /// success).
    pub success: bool,
    /// The page of matching entries.
    pub data: Vec<ListEntry>,
    /// Pagination metadata.
    pub pagination: Pagination,
    /// Present only when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

/// The result of a `delete(uri)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// `true` iff a record was removed.
    pub success: bool,
    /// Present when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error kind backing `error`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<substrate_error::ErrorKind>,
}

impl DeleteOutcome {
    /// A successful delete.
    pub fn deleted() -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
        }
    }

    /// A failed delete, carrying the causing error.
    pub fn failed(err: &SubstrateError) -> Self {
        Self {
            success: false,
            error: Some(err.message.clone()),
            error_kind: Some(err.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// health
// ---------------------------------------------------------------------------

/// Coarse health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// The backend is able to serve requests.
    Healthy,
    /// The backend is not currently able to serve requests.
    Unhealthy,
}

/// The result of a `health()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthOutcome {
    /// Coarse status.
    pub status: HealthState,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Optional structured detail (e.g. per-child status for composites).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HealthOutcome {
    /// A plain healthy result.
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            message: None,
            details: None,
        }
    }

    /// An unhealthy result with a message.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            message: Some(message.into()),
            details: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend / Reader
// ---------------------------------------------------------------------------

/// The uniform nine-operation protocol every backend implements.
///
/// Every operation may suspend (I/O, locking) and accepts an ambient
/// [`CancellationToken`] per §5's cancellation model. Implementations must
/// be safe to call from many tasks concurrently.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Validate and durably store `data` at `uri`.
    async fn receive(
        &self,
        uri: &Uri,
        data: PayloadValue,
        cancel: &CancellationToken,
    ) -> ReceiveOutcome;

    /// Look up the record at `uri`.
    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome;

    /// Look up records at every URI in `uris` (at most [`MAX_READ_MULTI`]).
    ///
    /// The default implementation dispatches sequentially; implementations
    /// with cheap concurrent I/O may override it to fan out while
    /// preserving input order in the result.
    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        if uris.len() > MAX_READ_MULTI {
            let as_strings: Vec<String> =
                uris.iter().map(|u| u.as_str().to_string()).collect();
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

    /// Enumerate children whose URI begins with `prefix`.
    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult;

    /// Remove the record at `uri`.
    async fn delete(&self, uri: &Uri, cancel: &CancellationToken) -> DeleteOutcome;

    /// Report this backend's health.
    async fn health(&self, cancel: &CancellationToken) -> HealthOutcome;

    /// The program keys this backend recognizes (has a validator for, or
    /// otherwise knows how to serve).
    fn get_schema(&self) -> Vec<String>;

    /// Release all resources. Must be safe to call more than once.
    async fn cleanup(&self);
}

/// A narrow read-only capability derived from a [`Backend`], handed to
/// validators so they can perform read-based checks without being able to
/// write — the type-level half of "validators must not call receive".
#[async_trait]
pub trait Reader: Send + Sync {
    /// Look up the record at `uri`.
    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome;
    /// Look up records at every URI in `uris`.
    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome;
    /// Enumerate children whose URI begins with `prefix`.
    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult;
}

#[async_trait]
impl<B: Backend + ?Sized> Reader for B {
    async fn read(&self, uri: &Uri, cancel: &CancellationToken) -> ReadOutcome {
        Backend::read(self, uri, cancel).await
    }

    async fn read_multi(&self, uris: &[Uri], cancel: &CancellationToken) -> ReadMultiOutcome {
        Backend::read_multi(self, uris, cancel).await
    }

    async fn list(
        &self,
        prefix: &Uri,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> ListResult {
        Backend::list(self, prefix, options, cancel).await
    }
}
