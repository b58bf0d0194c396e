//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path → defaults.

use std::path::{Path, PathBuf};

/// Where the configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Resolved configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPath {
    /// Path to cltv.json (or None when defaults apply).
    pub path: Option<PathBuf>,

    /// Where it came from (for diagnostics).
    pub source: ConfigSource,
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "CLTV_CONFIG";
pub const ENV_CONFIG_DIR: &str = "CLTV_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "cltv.json";

/// Application name for XDG directories.
const APP_NAME: &str = "cltv";

/// Resolve the configuration file path.
///
/// Resolution order:
/// 1. Explicit CLI path (if provided)
/// 2. `CLTV_CONFIG` environment variable (file path)
/// 3. `CLTV_CONFIG_DIR` environment variable + `cltv.json`
/// 4. XDG config directory (`$XDG_CONFIG_HOME/cltv/cltv.json`)
/// 5. Built-in defaults (None)
///
/// An explicit CLI path is returned even when it does not exist so the
/// loader can report it; every other candidate must exist to be chosen.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPath {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return ConfigPath {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return ConfigPath {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    // 5. Built-in default
    ConfigPath::default()
}

/// Get the XDG config directory for cltv.
///
/// `XDG_CONFIG_HOME` wins when set; otherwise the platform config dir.
pub fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|d| d.join(APP_NAME))
}
