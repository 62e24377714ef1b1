//! Unified error taxonomy with stable error codes for the persistence substrate.
//!
//! Every substrate error carries an [`ErrorKind`] (a machine-readable, stable
//! string tag matching the taxonomy every backend, validator, and frontend
//! must keep stable), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`SubstrateError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Stable error-kind taxonomy shared by every backend, validator, and
/// frontend. Kinds are surfaced in `error` strings and HTTP status mapping;
/// callers may match on the kind but implementers must never repurpose one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No record exists at the given URI.
    NotFound,
    /// An immutable or content-addressed record already exists.
    Exists,
    /// A write targeted an `immutable://` URI that already holds a record.
    Immutable,
    /// A validator rejected the write.
    ValidationFailed,
    /// The URI's program key has no registered validator and the backend
    /// policy rejects unknown programs.
    UnknownProgram,
    /// An authenticated envelope's signature did not verify.
    SignatureFailed,
    /// A content-addressed URI's declared digest did not match the data.
    HashMismatch,
    /// The operation is not supported by this backend.
    NotImplemented,
    /// A network or I/O failure occurred reaching a backend.
    Transport,
    /// The operation was cancelled before it completed.
    Cancelled,
    /// The operation exceeded its configured timeout.
    Timeout,
}

impl ErrorKind {
    /// Stable `&'static str` representation (e.g. `"not-found"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Exists => "exists",
            Self::Immutable => "immutable",
            Self::ValidationFailed => "validation-failed",
            Self::UnknownProgram => "unknown-program",
            Self::SignatureFailed => "signature-failed",
            Self::HashMismatch => "hash-mismatch",
            Self::NotImplemented => "not-implemented",
            Self::Transport => "transport",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    /// The HTTP status code this kind maps to, per the frontend's error
    /// propagation policy.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ValidationFailed | Self::SignatureFailed | Self::HashMismatch | Self::Exists
            | Self::Immutable => 400,
            Self::NotImplemented => 501,
            Self::Transport | Self::Timeout | Self::Cancelled => 503,
            Self::UnknownProgram => 400,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SubstrateError
// ---------------------------------------------------------------------------

/// Unified substrate error.
///
/// Carries a stable [`ErrorKind`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// ```
/// use substrate_error::{SubstrateError, ErrorKind};
///
/// let err = SubstrateError::new(ErrorKind::Timeout, "timed out after 30 s")
///     .with_context("uri", "mutable://open/k")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct SubstrateError {
    /// Machine-readable error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl SubstrateError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand constructors for the most frequently raised kinds.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::ValidationFailed`].
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    /// Shorthand for [`ErrorKind::HashMismatch`].
    pub fn hash_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HashMismatch, message)
    }

    /// Shorthand for [`ErrorKind::SignatureFailed`].
    pub fn signature_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SignatureFailed, message)
    }

    /// The HTTP status this error maps to.
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Debug for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SubstrateError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for SubstrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for SubstrateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`SubstrateError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstrateErrorDto {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&SubstrateError> for SubstrateErrorDto {
    fn from(err: &SubstrateError) -> Self {
        Self {
            kind: err.kind,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<SubstrateErrorDto> for SubstrateError {
    fn from(dto: SubstrateErrorDto) -> Self {
        Self {
            kind: dto.kind,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
