//! X25519 + ChaCha20-Poly1305 sealed boxes.
//!
//! A sealed box lets anyone encrypt to a recipient's X25519 public key
//! without needing a reply channel: an ephemeral keypair is generated per
//! message, ECDH'd against the recipient's public key, and the shared
//! secret (hashed through SHA-256 to whiten it into a uniform AEAD key)
//! encrypts the payload. The wire format is
//! `ephemeral_pubkey(32) || nonce(12) || ciphertext`.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

const NONCE_LEN: usize = 12;
const PUBKEY_LEN: usize = 32;

/// Errors raised while sealing or unsealing.
#[derive(Debug, Error)]
pub enum SealedBoxError {
    /// The sealed box was shorter than the minimum header length.
    #[error("sealed box too short: got {got} bytes, need at least {min}")]
    TooShort {
        /// Bytes actually present.
        got: usize,
        /// Minimum bytes required.
        min: usize,
    },
    /// AEAD decryption failed (wrong key, or the box was tampered with).
    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,
    /// Hex decoding of a key failed.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// A decoded key was not 32 bytes.
    #[error("key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

fn derive_aead_key(shared_secret: &x25519_dalek::SharedSecret) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(shared_secret.as_bytes());
    *Key::from_slice(&hasher.finalize())
}

/// Generate a fresh X25519 keypair for encryption (distinct from the
/// Ed25519 signing keypair).
pub fn generate_encryption_keypair() -> (StaticSecret, PublicKey) {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let secret = StaticSecret::from(bytes);
    let public = PublicKey::from(&secret);
    (secret, public)
}

/// Encrypt `plaintext` to `recipient_public_hex`.
pub fn seal(recipient_public_hex: &str, plaintext: &[u8]) -> Result<Vec<u8>, SealedBoxError> {
    let recipient_public = decode_public(recipient_public_hex)?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&recipient_public);
    let key = derive_aead_key(&shared);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = ChaCha20Poly1305::new(&key);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SealedBoxError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(PUBKEY_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a sealed box produced by [`seal`], using the recipient's private
/// key.
pub fn unseal(recipient_secret: &StaticSecret, sealed: &[u8]) -> Result<Vec<u8>, SealedBoxError> {
    let min_len = PUBKEY_LEN + NONCE_LEN;
    if sealed.len() < min_len {
        return Err(SealedBoxError::TooShort {
            got: sealed.len(),
            min: min_len,
        });
    }

    let ephemeral_public_bytes: [u8; PUBKEY_LEN] = sealed[..PUBKEY_LEN].try_into().unwrap();
    let ephemeral_public = PublicKey::from(ephemeral_public_bytes);
    let nonce_bytes = &sealed[PUBKEY_LEN..min_len];
    let ciphertext = &sealed[min_len..];

    let shared = recipient_secret.diffie_hellman(&ephemeral_public);
    let key = derive_aead_key(&shared);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = ChaCha20Poly1305::new(&key);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SealedBoxError::DecryptionFailed)
}

fn decode_public(hex_str: &str) -> Result<PublicKey, SealedBoxError> {
    let bytes = hex::decode(hex_str)?;
    let arr: [u8; 32] = bytes
        .clone()
        .try_into()
        .map_err(|_| SealedBoxError::InvalidKeyLength(bytes.len()))?;
    Ok(PublicKey::from(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_unseal_round_trips() {
        let (secret, public) = generate_encryption_keypair();
        let sealed = seal(&hex::encode(public.as_bytes()), b"top secret").unwrap();
        let plaintext = unseal(&secret, &sealed).unwrap();
        assert_eq!(plaintext, b"top secret");
    }

    #[test]
    fn wrong_recipient_key_fails() {
        let (_secret, public) = generate_encryption_keypair();
        let (other_secret, _other_public) = generate_encryption_keypair();
        let sealed = seal(&hex::encode(public.as_bytes()), b"hello").unwrap();
        assert!(unseal(&other_secret, &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (secret, public) = generate_encryption_keypair();
        let mut sealed = seal(&hex::encode(public.as_bytes()), b"hello").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(unseal(&secret, &sealed).is_err());
    }

    #[test]
    fn too_short_box_is_rejected() {
        let (secret, _) = generate_encryption_keypair();
        let err = unseal(&secret, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, SealedBoxError::TooShort { .. }));
    }

    #[test]
    fn each_seal_uses_a_fresh_nonce_and_ephemeral_key() {
        let (_secret, public) = generate_encryption_keypair();
        let pub_hex = hex::encode(public.as_bytes());
        let a = seal(&pub_hex, b"same plaintext").unwrap();
        let b = seal(&pub_hex, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
