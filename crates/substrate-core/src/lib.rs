// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! substrate-core
//!
//! The stable contract for the persistence substrate: the URI scheme model,
//! the record model, canonical JSON encoding, authenticated envelopes, and
//! transaction-data payloads. If you only take one dependency, take this one.

/// Canonical JSON serialization shared by hashing, signatures, and
/// transaction-data validation.
pub mod canonical;
/// Authenticated envelope: `{auth, payload}` signed over `payload`.
pub mod envelope;
/// The record model: `Record`, `PayloadValue`, and the binary envelope.
pub mod record;
/// Transaction-data payload shape: `{inputs, outputs}`.
pub mod transaction;
/// URI parsing, scheme taxonomy, and the program key.
pub mod uri;

pub use canonical::canonical_json_bytes;
pub use envelope::AuthEnvelope;
pub use record::{PayloadValue, Record};
pub use transaction::TransactionData;
pub use uri::{ProgramKey, Scheme, Uri};

/// Current wire-protocol version string embedded in HTTP/WS frontend
/// responses and the CLI's manifest push.
pub const PROTOCOL_VERSION: &str = "substrate/v1";
