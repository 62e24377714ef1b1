// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Crypto primitives for the persistence substrate.
//!
//! Four independent concerns, one per module: Ed25519 signing over
//! authenticated-envelope payloads, X25519 sealed boxes for the
//! encryption keypair named in the key file format, PEM/PKCS8 codecs for
//! private key material, and SHA-256 content hashing for `hash://`/
//! `blob://` digest verification.

/// SHA-256 content hashing and the `algo:hex` digest-string codec.
pub mod hash;
/// The operator key file format: PEM body plus `KEY=value` lines.
pub mod keyfile;
/// X25519 + ChaCha20-Poly1305 sealed-box encryption.
pub mod sealed_box;
/// Ed25519 keypair generation, signing, and verification.
pub mod signing;

pub use hash::{content_digest_hex, sha256_hex, verify_digest};
pub use keyfile::KeyFile;
pub use sealed_box::{SealedBoxError, generate_encryption_keypair, seal, unseal};
pub use signing::{
    SigningError, generate_keypair, pubkey_hex, sign_hex, to_pkcs8_pem, verify_hex,
};
