//! Ed25519 keypair generation, hex-based sign/verify, and PEM/PKCS8 codecs.
//!
//! Authenticated envelopes (`{auth: [{pubkey, signature}], payload}`) carry
//! hex-encoded public keys and signatures; this module is the only place
//! that turns those hex strings into real `ed25519-dalek` key material.

use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Errors raised by signing/verification/key-codec operations.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A hex string did not decode to the expected byte length.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// Decoded bytes were not a valid Ed25519 public key, private key, or
    /// signature.
    #[error("invalid key or signature material: {0}")]
    InvalidMaterial(String),
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
    /// PEM/PKCS8 encoding or decoding failed.
    #[error("pkcs8 codec error: {0}")]
    Pkcs8(String),
}

/// Generate a fresh Ed25519 keypair.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Hex encoding of a verifying (public) key.
pub fn pubkey_hex(key: &VerifyingKey) -> String {
    hex::encode(key.to_bytes())
}

/// Sign `message` with `signing_key`, returning the hex-encoded signature.
pub fn sign_hex(signing_key: &SigningKey, message: &[u8]) -> String {
    hex::encode(signing_key.sign(message).to_bytes())
}

/// Verify a hex-encoded signature over `message` against a hex-encoded
/// public key.
pub fn verify_hex(
    pubkey_hex_str: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), SigningError> {
    let pubkey_bytes = hex::decode(pubkey_hex_str)?;
    let pubkey_bytes: [u8; 32] = pubkey_bytes
        .try_into()
        .map_err(|_| SigningError::InvalidMaterial("public key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&pubkey_bytes)
        .map_err(|e| SigningError::InvalidMaterial(e.to_string()))?;

    let sig_bytes = hex::decode(signature_hex)?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| SigningError::InvalidMaterial("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SigningError::VerificationFailed)
}

/// Encode a signing key as a PEM-encoded PKCS8 private key, matching the §6
/// key file format's first block.
pub fn to_pkcs8_pem(signing_key: &SigningKey) -> Result<String, SigningError> {
    signing_key
        .to_pkcs8_pem(Default::default())
        .map(|z| z.to_string())
        .map_err(|e| SigningError::Pkcs8(e.to_string()))
}

/// Decode a signing key from a PEM-encoded PKCS8 private key.
pub fn from_pkcs8_pem(pem: &str) -> Result<SigningKey, SigningError> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| SigningError::Pkcs8(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let (sk, vk) = generate_keypair();
        let msg = b"canonical payload bytes";
        let sig = sign_hex(&sk, msg);
        verify_hex(&pubkey_hex(&vk), msg, &sig).unwrap();
    }

    #[test]
    fn tampered_message_fails_verification() {
        let (sk, vk) = generate_keypair();
        let sig = sign_hex(&sk, b"original");
        let err = verify_hex(&pubkey_hex(&vk), b"tampered", &sig).unwrap_err();
        assert!(matches!(err, SigningError::VerificationFailed));
    }

    #[test]
    fn wrong_pubkey_fails_verification() {
        let (sk, _vk) = generate_keypair();
        let (_other_sk, other_vk) = generate_keypair();
        let sig = sign_hex(&sk, b"msg");
        let err = verify_hex(&pubkey_hex(&other_vk), b"msg", &sig).unwrap_err();
        assert!(matches!(err, SigningError::VerificationFailed));
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let (sk, _vk) = generate_keypair();
        let sig = sign_hex(&sk, b"msg");
        let err = verify_hex("not-hex!!", b"msg", &sig).unwrap_err();
        assert!(matches!(err, SigningError::InvalidHex(_)));
    }

    #[test]
    fn pem_pkcs8_round_trip_preserves_identity() {
        let (sk, vk) = generate_keypair();
        let pem = to_pkcs8_pem(&sk).unwrap();
        let restored = from_pkcs8_pem(&pem).unwrap();
        assert_eq!(restored.verifying_key().to_bytes(), vk.to_bytes());
    }
}
