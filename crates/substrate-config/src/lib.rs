// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the persistence substrate.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors and warnings
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating a [`SubstrateConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The given path does not exist or could not be read.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },
    /// The file's contents are not valid TOML, or don't match the schema.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// The underlying parser message.
        reason: String,
    },
    /// The parsed config failed one or more validation rules.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// One message per failed rule.
        reasons: Vec<String>,
    },
    /// Two configs could not be merged.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Human-readable description of the conflict.
        reason: String,
    },
}

/// Advisory (non-fatal) issues surfaced during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A field is set but deprecated in favor of another.
    DeprecatedField {
        /// The deprecated field's name.
        field: String,
        /// The field to use instead, if any.
        suggestion: Option<String>,
    },
    /// A recommended field was left unset.
    MissingOptionalField {
        /// The field's name.
        field: String,
        /// Why setting it is recommended.
        hint: String,
    },
    /// A configured interval or timeout is unusually large.
    LargeInterval {
        /// The field the interval belongs to.
        field: String,
        /// The configured value, in milliseconds.
        millis: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => match suggestion {
                Some(s) => write!(f, "field '{field}' is deprecated, use '{s}' instead"),
                None => write!(f, "field '{field}' is deprecated"),
            },
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeInterval { field, millis } => {
                write!(f, "'{field}' is unusually large ({millis}ms)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for a substrate node.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateConfig {
    /// This node's identity, used in logs and peer manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Allowed CORS origin(s) for the HTTP/WS frontend. `"*"` allows any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,

    /// TCP port the HTTP/WS frontend binds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Backends composed into this node's store, in the order they were
    /// declared.
    #[serde(default)]
    pub backends: Vec<BackendSpec>,

    /// Maps a program key (`scheme://authority`) to the name of the schema
    /// that validates it.
    #[serde(default)]
    pub schema_registry: BTreeMap<String, String>,

    /// How often a peer connection sends a liveness heartbeat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,

    /// How often the daemon re-reads its config file from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_poll_interval_ms: Option<u64>,

    /// Whether to expose in-process accept/reject/latency counters.
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            node: None,
            cors_origin: Some("*".into()),
            port: Some(8080),
            backends: Vec::new(),
            schema_registry: BTreeMap::new(),
            heartbeat_interval_ms: Some(30_000),
            config_poll_interval_ms: Some(60_000),
            metrics_enabled: false,
        }
    }
}

/// A single backend declaration, resolved into a live `Backend` trait object
/// by the code that composes a node's store.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendSpec {
    /// The in-memory reference backend.
    Memory {},
    /// An HTTP peer backend.
    Http {
        /// The remote node's base URL.
        url: String,
        /// Free-form backend-specific options.
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
    /// A WebSocket peer backend.
    Ws {
        /// The remote node's WebSocket URL.
        url: String,
        /// Free-form backend-specific options.
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
    /// A SQL-backed adapter (interface only; the body returns `not-implemented`).
    Sql {
        /// A connection string.
        url: String,
        /// Free-form backend-specific options.
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
    /// A document-store-backed adapter (interface only).
    Doc {
        /// A connection string.
        url: String,
        /// Free-form backend-specific options.
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Above this, a heartbeat or poll interval generates an advisory warning.
const LARGE_INTERVAL_THRESHOLD_MS: u64 = 10 * 60 * 1_000;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`SubstrateConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`SubstrateConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<SubstrateConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => SubstrateConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`SubstrateConfig`].
pub fn parse_toml(content: &str) -> Result<SubstrateConfig, ConfigError> {
    toml::from_str::<SubstrateConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `SUBSTRATE_NODE`
/// - `SUBSTRATE_CORS_ORIGIN`
/// - `SUBSTRATE_PORT`
/// - `SUBSTRATE_METRICS_ENABLED`
pub fn apply_env_overrides(config: &mut SubstrateConfig) {
    if let Ok(val) = std::env::var("SUBSTRATE_NODE") {
        config.node = Some(val);
    }
    if let Ok(val) = std::env::var("SUBSTRATE_CORS_ORIGIN") {
        config.cors_origin = Some(val);
    }
    if let Ok(val) = std::env::var("SUBSTRATE_PORT")
        && let Ok(port) = val.parse::<u16>()
    {
        config.port = Some(port);
    }
    if let Ok(val) = std::env::var("SUBSTRATE_METRICS_ENABLED") {
        config.metrics_enabled = val == "1" || val.eq_ignore_ascii_case("true");
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty peer URLs, zero-valued intervals) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &SubstrateConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    for (index, backend) in config.backends.iter().enumerate() {
        match backend {
            BackendSpec::Http { url, .. } | BackendSpec::Ws { url, .. } => {
                if url.trim().is_empty() {
                    errors.push(format!("backends[{index}]: url must not be empty"));
                }
            }
            BackendSpec::Sql { url, .. } | BackendSpec::Doc { url, .. } => {
                if url.trim().is_empty() {
                    errors.push(format!(
                        "backends[{index}]: connection string must not be empty"
                    ));
                }
            }
            BackendSpec::Memory {} => {}
        }
    }

    if let Some(0) = config.heartbeat_interval_ms {
        errors.push("heartbeatIntervalMs must be greater than zero".into());
    } else if let Some(ms) = config.heartbeat_interval_ms
        && ms > LARGE_INTERVAL_THRESHOLD_MS
    {
        warnings.push(ConfigWarning::LargeInterval {
            field: "heartbeatIntervalMs".into(),
            millis: ms,
        });
    }

    if let Some(0) = config.config_poll_interval_ms {
        errors.push("configPollIntervalMs must be greater than zero".into());
    } else if let Some(ms) = config.config_poll_interval_ms
        && ms > LARGE_INTERVAL_THRESHOLD_MS
    {
        warnings.push(ConfigWarning::LargeInterval {
            field: "configPollIntervalMs".into(),
            millis: ms,
        });
    }

    if config.node.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "node".into(),
            hint: "peer manifests and logs will identify this node only by address".into(),
        });
    }
    if config.backends.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "backends".into(),
            hint: "no backend is configured; the node will serve no storage".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Backend lists concatenate (`base` first, then `overlay`); the schema
/// registry map is combined with overlay entries winning on key collision.
pub fn merge_configs(base: SubstrateConfig, overlay: SubstrateConfig) -> SubstrateConfig {
    let mut backends = base.backends;
    backends.extend(overlay.backends);
    let mut schema_registry = base.schema_registry;
    schema_registry.extend(overlay.schema_registry);
    SubstrateConfig {
        node: overlay.node.or(base.node),
        cors_origin: overlay.cors_origin.or(base.cors_origin),
        port: overlay.port.or(base.port),
        backends,
        schema_registry,
        heartbeat_interval_ms: overlay.heartbeat_interval_ms.or(base.heartbeat_interval_ms),
        config_poll_interval_ms: overlay
            .config_poll_interval_ms
            .or(base.config_poll_interval_ms),
        metrics_enabled: overlay.metrics_enabled || base.metrics_enabled,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
