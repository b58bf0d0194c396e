//! Configuration loading for the `cltv` binary.
//!
//! This module handles:
//! - Resolving cltv.json (CLI > env > XDG > defaults)
//! - Parsing and semantic validation via cltv-config
//! - Snapshot generation for run reports

pub use cltv_config::{
    ConfigPath, ConfigSnapshot, ConfigSource, PipelineConfig, ValidationError,
    CONFIG_SCHEMA_VERSION,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl ConfigError {
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } | ConfigError::IoError { .. } => 60,
            ConfigError::ParseError { source, .. } => source.code(),
            ConfigError::ValidationError(e) => e.code(),
        }
    }
}

impl From<ConfigError> for cltv_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => cltv_common::Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )),
            ConfigError::IoError { source, .. } => cltv_common::Error::Io(source),
            ConfigError::ParseError { .. } => cltv_common::Error::Config(err.to_string()),
            ConfigError::ValidationError(_) => cltv_common::Error::InvalidConfig(err.to_string()),
        }
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    /// Where the settings came from.
    pub path: ConfigPath,
    /// Raw file content, kept for hashing (None when using defaults).
    raw: Option<String>,
}

impl ResolvedConfig {
    /// Create a config snapshot for run reports.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(&self.config, &self.path, self.raw.as_deref())
    }

    pub fn is_default(&self) -> bool {
        self.raw.is_none()
    }
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit `--config` path (must exist)
/// 2. `CLTV_CONFIG` file, then `CLTV_CONFIG_DIR/cltv.json`
/// 3. `$XDG_CONFIG_HOME/cltv/cltv.json`
/// 4. Built-in defaults
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let path = cltv_config::resolve_config(cli_path);

    let Some(file) = path.path.clone() else {
        let config = PipelineConfig::default();
        cltv_config::validate_config(&config)?;
        return Ok(ResolvedConfig {
            config,
            path,
            raw: None,
        });
    };

    if !file.exists() {
        return Err(ConfigError::NotFound { path: file });
    }
    let raw = std::fs::read_to_string(&file).map_err(|source| ConfigError::IoError {
        path: file.clone(),
        source,
    })?;
    let config = PipelineConfig::from_json(&raw).map_err(|source| ConfigError::ParseError {
        path: file.clone(),
        source,
    })?;
    cltv_config::validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path,
        raw: Some(raw),
    })
}
