//! SHA-256 content hashing for `hash://` and `blob://` URIs.

use sha2::{Digest, Sha256};
use substrate_core::canonical_json_bytes;
use substrate_core::record::PayloadValue;

/// Hex-encoded SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The digest a content-addressed write is checked against: raw bytes for a
/// binary payload, canonical-JSON bytes otherwise.
pub fn content_digest_hex(value: &PayloadValue) -> String {
    match value {
        PayloadValue::Binary(bytes) => sha256_hex(bytes),
        PayloadValue::Json(json) => sha256_hex(&canonical_json_bytes(json)),
    }
}

/// `true` if `value`'s content digest equals `expected_hex` (case-insensitive).
pub fn verify_digest(value: &PayloadValue, expected_hex: &str) -> bool {
    content_digest_hex(value).eq_ignore_ascii_case(expected_hex)
}
