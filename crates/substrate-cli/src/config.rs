// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading for the substrate CLI: the node URL and operator
//! key path an invocation defaults to when the matching flag is omitted.

use schemars::JsonSchema;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Operator-level CLI defaults, loaded from a TOML file (e.g.
/// `~/.config/substrate/cli.toml`) pointed at by `--config`.
#[derive(Debug, Clone, Deserialize, Default, JsonSchema, PartialEq)]
pub struct CliConfig {
    /// Default node base URL (e.g. `http://127.0.0.1:8080/api/v1`) used when
    /// a subcommand's `--node` flag is omitted.
    #[serde(default)]
    pub node: Option<String>,
    /// Default operator key file path used when `--key` is omitted.
    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// Errors found while loading or validating a [`CliConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read.
    NotFound { path: String },
    /// The file's contents are not valid TOML for this shape.
    Parse { reason: String },
    /// `node` is set but not an `http(s)://` URL.
    InvalidNodeUrl { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { path } => write!(f, "config file not found: {path}"),
            ConfigError::Parse { reason } => write!(f, "failed to parse config: {reason}"),
            ConfigError::InvalidNodeUrl { value } => {
                write!(f, "invalid node url '{value}': must start with http:// or https://")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate a [`CliConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<CliConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
        path: path.display().to_string(),
    })?;
    let config: CliConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate a parsed [`CliConfig`]'s invariants.
pub fn validate_config(config: &CliConfig) -> Result<(), ConfigError> {
    if let Some(ref node) = config.node {
        if !(node.starts_with("http://") || node.starts_with("https://")) {
            return Err(ConfigError::InvalidNodeUrl {
                value: node.clone(),
            });
        }
    }
    Ok(())
}
