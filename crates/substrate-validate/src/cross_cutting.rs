//! Cross-cutting rules enforced inside `schema`/`msgSchema` regardless of
//! which program key a write targets: content-hash integrity for
//! content-addressed URIs, and signature verification for authenticated
//! envelopes under an `accounts` authority.

use substrate_core::envelope::AuthEnvelope;
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_crypto::verify_digest;
use substrate_error::SubstrateError;

const ACCOUNTS_AUTHORITY: &str = "accounts";

/// For `hash://` and `blob://` URIs, verify the declared digest matches the
/// content digest of `value`. A no-op for any other scheme.
pub fn check_content_hash(uri: &Uri, value: &PayloadValue) -> Result<(), SubstrateError> {
    if !uri.scheme().is_content_addressed() {
        return Ok(());
    }
    let (_, expected_hex) = uri.content_digest().ok_or_else(|| {
        SubstrateError::validation_failed(format!(
            "content-addressed uri missing digest: {uri}"
        ))
    })?;
    if verify_digest(value, expected_hex) {
        Ok(())
    } else {
        Err(SubstrateError::hash_mismatch(format!(
            "digest of written data does not match {expected_hex} declared by {uri}"
        )))
    }
}

/// For `…://accounts/<pubkey>/…` programs, require an authenticated
/// envelope whose `auth` contains an entry matching `<pubkey>` with a
/// signature that verifies over the envelope's payload. A no-op for any
/// other authority.
pub fn check_authenticated_envelope(uri: &Uri, value: &PayloadValue) -> Result<(), SubstrateError> {
    if uri.authority() != ACCOUNTS_AUTHORITY {
        return Ok(());
    }

    let pubkey = uri
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SubstrateError::validation_failed(format!(
                "accounts uri missing pubkey path segment: {uri}"
            ))
        })?;

    let Some(json) = value.as_json() else {
        return Err(SubstrateError::signature_failed(
            "accounts writes must be a JSON authenticated envelope, got binary data",
        ));
    };
    if !AuthEnvelope::looks_like_envelope(json) {
        return Err(SubstrateError::signature_failed(
            "accounts writes require an authenticated envelope ({auth, payload})",
        ));
    }
    let envelope: AuthEnvelope = serde_json::from_value(json.clone())
        .map_err(|e| SubstrateError::signature_failed(format!("malformed envelope: {e}")))?;

    let signing_bytes = envelope.signing_bytes();
    let verified = envelope.auth.iter().any(|entry| {
        entry.pubkey == pubkey
            && substrate_crypto::verify_hex(&entry.pubkey, &signing_bytes, &entry.signature)
                .is_ok()
    });

    if verified {
        Ok(())
    } else {
        Err(SubstrateError::signature_failed(format!(
            "no auth entry for {pubkey} verified over the envelope payload"
        )))
    }
}
