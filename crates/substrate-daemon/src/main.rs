#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use substrate_backend::Backend;
use substrate_backend_memory::MemoryBackend;
use substrate_compose::{AcceptPolicy, FirstMatchSequence, ParallelBroadcast, ValidatedClient};
use substrate_config::{apply_env_overrides, validate_config, BackendSpec, SubstrateConfig};
use substrate_daemon::{build_router, AppState, CorsConfig};
use substrate_peer::{DocBackend, HttpPeerBackend, RetryConfig, SqlBackend, WsPeerBackend};
use substrate_telemetry::MetricsCollector;
use substrate_validate::{schema, SchemaRegistry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "substrate-daemon", version, about = "Persistence substrate HTTP/WebSocket frontend")]
struct Args {
    /// Path to a TOML config file. If omitted, defaults plus environment
    /// overrides are used.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the config's `port`.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("substrate=debug")
    } else {
        EnvFilter::new("substrate=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => substrate_config::parse_toml(
            &std::fs::read_to_string(path)
                .with_context(|| format!("read config file {}", path.display()))?,
        )
        .with_context(|| format!("parse config file {}", path.display()))?,
        None => SubstrateConfig::default(),
    };
    apply_env_overrides(&mut config);

    for warning in validate_config(&config).context("validate config")? {
        warn!(%warning, "config warning");
    }

    let registry = build_registry(&config);
    let backend = build_backend(&config, registry.clone()).await?;

    let metrics = if config.metrics_enabled {
        Some(MetricsCollector::new())
    } else {
        None
    };
    let state = Arc::new(match metrics {
        Some(m) => AppState::with_metrics(backend, m),
        None => AppState::new(backend),
    });

    let cors = config
        .cors_origin
        .as_deref()
        .map(|origin| CorsConfig {
            allowed_origins: vec![origin.to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["content-type".to_string(), "authorization".to_string()],
        })
        .unwrap_or_else(CorsConfig::permissive);

    let port = config.port.unwrap_or(8080);
    let bind = format!("{}:{port}", args.host);
    let router = build_router(state, cors);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(bind = %bind, node = ?config.node, "substrate-daemon listening");

    axum::serve(listener, router).await.context("serve")
}

/// Turn `config.schema_registry`'s program keys into open program keys.
/// This crate doesn't bundle concrete named schemas for application
/// programs; a deployment that needs stricter enforcement registers its own
/// validators against a `SchemaRegistryBuilder` in a thin wrapper binary.
fn build_registry(config: &SubstrateConfig) -> Arc<SchemaRegistry> {
    let mut builder = SchemaRegistry::builder();
    for program_key in config.schema_registry.keys() {
        builder = builder.open_program_key(program_key.clone());
    }
    builder.build()
}

async fn build_backend(
    config: &SubstrateConfig,
    registry: Arc<SchemaRegistry>,
) -> Result<Arc<dyn Backend>> {
    let specs = if config.backends.is_empty() {
        vec![BackendSpec::Memory {}]
    } else {
        config.backends.clone()
    };

    let mut children: Vec<Arc<dyn Backend>> = Vec::with_capacity(specs.len());
    for spec in &specs {
        children.push(build_child(spec, &registry).await?);
    }

    let write: Arc<dyn Backend> = Arc::new(ParallelBroadcast::new(children.clone(), AcceptPolicy::Majority));
    let read: Arc<dyn Backend> = Arc::new(FirstMatchSequence::new(children));
    Ok(Arc::new(ValidatedClient::new(write, read, schema(registry))))
}

async fn build_child(spec: &BackendSpec, registry: &Arc<SchemaRegistry>) -> Result<Arc<dyn Backend>> {
    Ok(match spec {
        BackendSpec::Memory {} => Arc::new(MemoryBackend::new(schema(registry.clone()), registry.clone())),
        BackendSpec::Http { url, .. } => Arc::new(HttpPeerBackend::new(url.clone())),
        BackendSpec::Ws { url, .. } => Arc::new(
            WsPeerBackend::connect(url.clone(), RetryConfig::default())
                .await
                .with_context(|| format!("connect to ws peer {url}"))?,
        ),
        BackendSpec::Sql { url, .. } => Arc::new(SqlBackend::new(url.clone())),
        BackendSpec::Doc { url, .. } => Arc::new(DocBackend::new(url.clone())),
    })
}
