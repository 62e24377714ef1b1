// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the substrate CLI.
//!
//! These functions are library-level — pure where possible — so they can be
//! tested without spawning the binary or a network peer.

use anyhow::{Context, Result};
use schemars::schema_for;
use serde_json::Value;
use std::path::{Path, PathBuf};
use substrate_core::envelope::{AuthEntry, AuthEnvelope};
use substrate_crypto::{content_digest_hex, sign_hex};
use substrate_core::record::PayloadValue;
use ed25519_dalek::SigningKey;

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`crate::config::CliConfig`].
    CliConfig,
    /// JSON schema for `substrate_config::SubstrateConfig`.
    NodeConfig,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::CliConfig => serde_json::to_value(schema_for!(crate::config::CliConfig))?,
        SchemaKind::NodeConfig => {
            serde_json::to_value(schema_for!(substrate_config::SubstrateConfig))?
        }
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// The `blob://open/sha256:<hex>` URI a file's bytes would be written
/// under.
pub fn blob_uri_for_bytes(bytes: &[u8]) -> String {
    format!(
        "blob://open/sha256:{}",
        content_digest_hex(&PayloadValue::Binary(bytes.to_vec()))
    )
}

/// Walk `root`, returning `(relative_path, absolute_path)` for every regular
/// file beneath it, sorted by relative path for deterministic manifests.
/// Relative paths use forward slashes regardless of platform.
pub fn collect_deploy_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let abs = entry.path().to_path_buf();
        let rel = abs
            .strip_prefix(root)
            .with_context(|| format!("strip prefix from {}", abs.display()))?;
        let rel_str = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push((rel_str, abs));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

/// Build a deploy manifest: a sorted JSON object mapping each relative path
/// to the `blob://` URI its content was written under.
pub fn build_manifest(entries: &[(String, String)]) -> Value {
    let map: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(path, uri)| (path.clone(), Value::String(uri.clone())))
        .collect();
    Value::Object(map)
}

/// Sign `payload` with `signing_key`, producing an authenticated envelope
/// with a single `auth` entry.
pub fn sign_envelope(payload: Value, signing_key: &SigningKey) -> AuthEnvelope {
    let envelope = AuthEnvelope::unsigned(payload);
    let signature = sign_hex(signing_key, &envelope.signing_bytes());
    let pubkey = substrate_crypto::pubkey_hex(&signing_key.verifying_key());
    envelope.with_auth(AuthEntry::new(pubkey, signature))
}

/// The `link://accounts/<pubkey>/<version>` URI a signed deploy manifest
/// version is written under.
pub fn version_uri(pubkey_hex: &str, version: &str) -> String {
    format!("link://accounts/{pubkey_hex}/{version}")
}

/// The well-known `mutable://` URI network manifests are distributed under.
pub const NETWORK_MANIFEST_URI: &str = "mutable://open/network/manifest";

/// Parse a network manifest file: a JSON array of peer base URLs, or an
/// object with a `peers` array.
pub fn parse_network_manifest(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text).context("parse network manifest JSON")?;
    let peers = match &value {
        Value::Array(_) => &value,
        Value::Object(map) => map
            .get("peers")
            .filter(|v| v.is_array())
            .context("manifest object must have a 'peers' array")?,
        _ => anyhow::bail!("network manifest must be a JSON array or an object with 'peers'"),
    };
    anyhow::ensure!(
        peers.as_array().unwrap().iter().all(Value::is_string),
        "every manifest peer entry must be a URL string"
    );
    Ok(value)
}
