// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Operator CLI for the persistence substrate.

mod commands;
mod config;
mod format;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::SchemaKind;
use std::path::PathBuf;
use std::sync::Arc;
use substrate_backend::Backend;
use substrate_backend_memory::MemoryBackend;
use substrate_compose::{AcceptPolicy, FirstMatchSequence, ParallelBroadcast, ValidatedClient};
use substrate_core::record::PayloadValue;
use substrate_core::uri::Uri;
use substrate_crypto::KeyFile;
use substrate_peer::HttpPeerBackend;
use substrate_validate::{schema, SchemaPolicy, SchemaRegistry};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::format::{Formatter, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "substrate", version, about = "Operator CLI for the persistence substrate")]
struct Cli {
    /// Node base URL (e.g. `http://127.0.0.1:8080/api/v1`). When omitted, an
    /// in-process backend is used — handy for offline key/manifest work.
    #[arg(long, global = true)]
    node: Option<String>,

    /// Path to an operator key file (PEM + hex lines), per `keygen`'s output.
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Path to a CLI defaults file (TOML); overridden by any explicit flag.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug-level logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an operator key file.
    Keygen {
        /// Path to write the key file to.
        #[arg(long, default_value = "operator.key")]
        out: PathBuf,
        /// Also generate an X25519 encryption keypair.
        #[arg(long)]
        with_encryption: bool,
    },
    /// Blob storage operations.
    #[command(subcommand)]
    Blob(BlobCommands),
    /// Content-hash every file under a directory and write a signed
    /// manifest pointing at the deployed root.
    Deploy {
        /// Directory to deploy.
        dir: PathBuf,
        /// Manifest version label (e.g. `v1`, a timestamp, a release tag).
        #[arg(long, default_value = "latest")]
        version: String,
    },
    /// Network manifest operations.
    #[command(subcommand)]
    Manifest(ManifestCommands),
    /// Report backend health.
    Health,
    /// List the program keys this node recognizes, or print a config schema.
    Schema {
        /// Print this CLI's or the node's config schema instead of the
        /// node's recognized program keys.
        #[arg(long, value_enum)]
        config_schema: Option<ConfigSchemaArg>,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum ConfigSchemaArg {
    Cli,
    Node,
}

#[derive(Subcommand, Debug)]
enum BlobCommands {
    /// Content-hash a local file and write it under its `blob://` URI.
    Put {
        /// File to upload.
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ManifestCommands {
    /// Distribute a network manifest (a JSON list of peer URLs) by writing
    /// it under the well-known manifest URI.
    Push {
        /// JSON file naming the peers (a bare array or `{"peers": [...]}`).
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("substrate=debug")
    } else {
        EnvFilter::new("substrate=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file_config = match &cli.config {
        Some(path) => Some(
            config::load_config(path)
                .with_context(|| format!("load CLI config from {}", path.display()))?,
        ),
        None => None,
    };

    let node = cli
        .node
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.node.clone()));
    let key_path = cli
        .key
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.key.clone()));

    let formatter = Formatter::new(cli.format.clone());
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Keygen {
            out,
            with_encryption,
        } => {
            let key_file = KeyFile::generate(with_encryption).context("generate operator key")?;
            std::fs::write(&out, key_file.to_text())
                .with_context(|| format!("write key file to {}", out.display()))?;
            println!("wrote operator key: {}", out.display());
            println!("public key: {}", key_file.public_key_hex);
        }

        Commands::Blob(BlobCommands::Put { path }) => {
            let backend = build_backend(node.as_deref())?;
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let uri_str = commands::blob_uri_for_bytes(&bytes);
            let uri = Uri::parse(&uri_str).context("build blob uri")?;
            let outcome = backend
                .receive(&uri, PayloadValue::Binary(bytes), &cancel)
                .await;
            println!("{}", formatter.format_receive(&outcome));
            println!("{uri_str}");
        }

        Commands::Deploy { dir, version } => {
            let backend = build_backend(node.as_deref())?;
            let key_path = key_path.context("deploy requires --key (an operator key file)")?;
            let key_text = std::fs::read_to_string(&key_path)
                .with_context(|| format!("read key file {}", key_path.display()))?;
            let key_file = KeyFile::parse(&key_text).context("parse operator key file")?;
            let signing_key = key_file.signing_key().context("load signing key")?;

            let files = commands::collect_deploy_files(&dir)
                .with_context(|| format!("walk deploy directory {}", dir.display()))?;

            let mut entries = Vec::with_capacity(files.len());
            for (rel_path, abs_path) in &files {
                let bytes = std::fs::read(abs_path)
                    .with_context(|| format!("read {}", abs_path.display()))?;
                let blob_uri = commands::blob_uri_for_bytes(&bytes);
                let uri = Uri::parse(&blob_uri).context("build blob uri")?;
                let outcome = backend
                    .receive(&uri, PayloadValue::Binary(bytes), &cancel)
                    .await;
                if !outcome.accepted {
                    anyhow::bail!(
                        "deploy failed writing {rel_path}: {}",
                        outcome.error.unwrap_or_default()
                    );
                }
                entries.push((rel_path.clone(), blob_uri));
            }

            let manifest = commands::build_manifest(&entries);
            let envelope = commands::sign_envelope(manifest, &signing_key);
            let envelope_json =
                serde_json::to_value(&envelope).context("serialize manifest envelope")?;

            let target = commands::version_uri(&key_file.public_key_hex, &version);
            let target_uri = Uri::parse(&target).context("build manifest version uri")?;
            let outcome = backend
                .receive(&target_uri, PayloadValue::Json(envelope_json), &cancel)
                .await;
            println!("{}", formatter.format_receive(&outcome));
            println!("deployed {} files under {target}", files.len());
        }

        Commands::Manifest(ManifestCommands::Push { file }) => {
            let backend = build_backend(node.as_deref())?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read manifest file {}", file.display()))?;
            let manifest = commands::parse_network_manifest(&text)?;
            let uri = Uri::parse(commands::NETWORK_MANIFEST_URI).expect("well-known uri parses");
            let outcome = backend
                .receive(&uri, PayloadValue::Json(manifest), &cancel)
                .await;
            println!("{}", formatter.format_receive(&outcome));
        }

        Commands::Health => {
            let backend = build_backend(node.as_deref())?;
            let outcome = backend.health(&cancel).await;
            println!("{}", formatter.format_health(&outcome));
        }

        Commands::Schema { config_schema } => match config_schema {
            Some(ConfigSchemaArg::Cli) => {
                println!("{}", commands::schema_json(SchemaKind::CliConfig)?)
            }
            Some(ConfigSchemaArg::Node) => {
                println!("{}", commands::schema_json(SchemaKind::NodeConfig)?)
            }
            None => {
                let backend = build_backend(node.as_deref())?;
                for key in backend.get_schema() {
                    println!("{key}");
                }
            }
        },
    }

    Ok(())
}

/// Construct a [`Backend`] for this invocation: an HTTP peer when `--node`
/// names a URL, otherwise a local open-policy in-memory backend for
/// offline key and manifest work.
fn build_backend(node: Option<&str>) -> Result<Arc<dyn Backend>> {
    match node {
        Some(url) => Ok(Arc::new(HttpPeerBackend::new(url.to_string()))),
        None => {
            let registry = SchemaRegistry::builder()
                .policy(SchemaPolicy::AcceptUnknown)
                .build();
            let memory: Arc<dyn Backend> =
                Arc::new(MemoryBackend::new(schema(registry.clone()), registry.clone()));
            let children = vec![memory];
            let write: Arc<dyn Backend> =
                Arc::new(ParallelBroadcast::new(children.clone(), AcceptPolicy::Majority));
            let read: Arc<dyn Backend> = Arc::new(FirstMatchSequence::new(children));
            Ok(Arc::new(ValidatedClient::new(write, read, schema(registry))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_round_trips_a_receive() {
        let backend = build_backend(None).unwrap();
        let cancel = CancellationToken::new();
        let uri = Uri::parse("mutable://open/cli-test").unwrap();
        let outcome = backend
            .receive(
                &uri,
                PayloadValue::Json(serde_json::json!({"a": 1})),
                &cancel,
            )
            .await;
        assert!(outcome.accepted);
        let read = backend.read(&uri, &cancel).await;
        assert!(read.success);
    }

    #[test]
    fn build_backend_local_has_no_network_dependency() {
        assert!(build_backend(None).is_ok());
    }
}
