//! The authenticated envelope: `{auth: [{pubkey, signature}], payload}`.
//!
//! Signatures are computed over the canonical JSON encoding of `payload`.
//! This module only models the envelope's shape; signing and verification
//! live in the crypto crate, which depends on this one.

use crate::canonical::canonical_json_bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single signature over an envelope's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// The signer's public key, hex-encoded.
    pub pubkey: String,
    /// The signature over the payload's canonical JSON bytes, hex-encoded.
    pub signature: String,
}

impl AuthEntry {
    /// Construct an auth entry from its hex-encoded parts.
    pub fn new(pubkey: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            signature: signature.into(),
        }
    }
}

/// A payload with zero or more attached signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEnvelope {
    /// Signatures over `payload`'s canonical JSON encoding.
    #[serde(default)]
    pub auth: Vec<AuthEntry>,
    /// The signed data.
    pub payload: Value,
}

impl AuthEnvelope {
    /// Wrap a payload with no signatures yet.
    pub fn unsigned(payload: Value) -> Self {
        Self {
            auth: Vec::new(),
            payload,
        }
    }

    /// Attach a signature.
    pub fn with_auth(mut self, entry: AuthEntry) -> Self {
        self.auth.push(entry);
        self
    }

    /// The exact bytes that every signature in `auth` is expected to sign:
    /// the canonical JSON encoding of `payload`.
    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_json_bytes(&self.payload)
    }

    /// `true` if the envelope carries at least one signature.
    pub fn is_signed(&self) -> bool {
        !self.auth.is_empty()
    }

    /// Detect whether a raw JSON value has the `{auth, payload}` shape.
    pub fn looks_like_envelope(value: &Value) -> bool {
        matches!(value, Value::Object(map) if map.contains_key("auth") && map.contains_key("payload"))
    }
}
