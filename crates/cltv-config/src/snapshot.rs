//! Configuration snapshots for run reports and reproducibility.
//!
//! A snapshot captures the effective settings at the start of a run, so a
//! report can be traced back to the exact configuration that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigPath;
use crate::settings::{PeriodUnit, PipelineConfig};

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub config_path: Option<String>,

    /// Source of the configuration.
    pub config_source: String,

    /// SHA-256 hash of the raw file content (None when using defaults).
    #[serde(default)]
    pub file_hash: Option<String>,

    /// SHA-256 hash of the effective settings serialized as JSON.
    pub effective_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub horizon_months: u32,
    pub period_unit: PeriodUnit,
    pub discount_rate: f64,
    pub frequency_penalizer: f64,
    pub monetary_penalizer: f64,
    pub round_monetary_limits: bool,
    #[serde(default)]
    pub analysis_date: Option<String>,
}

impl ConfigSnapshot {
    /// Create a new snapshot from loaded configuration.
    pub fn new(config: &PipelineConfig, path: &ConfigPath, raw_json: Option<&str>) -> Self {
        let effective = serde_json::to_string(config).unwrap_or_default();

        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            config_path: path.path.as_ref().map(|p| p.display().to_string()),
            config_source: path.source.to_string(),
            file_hash: raw_json.map(hash_content),
            effective_hash: hash_content(&effective),
            summary: ConfigSummary::from(config),
        }
    }

    /// Create a snapshot with only defaults (no config file loaded).
    pub fn defaults_only() -> Self {
        Self::new(&PipelineConfig::default(), &ConfigPath::default(), None)
    }
}

impl From<&PipelineConfig> for ConfigSummary {
    fn from(config: &PipelineConfig) -> Self {
        ConfigSummary {
            horizon_months: config.cltv.time,
            period_unit: config.cltv.freq,
            discount_rate: config.cltv.discount_rate,
            frequency_penalizer: config.frequency_model.penalizer,
            monetary_penalizer: config.monetary_model.penalizer,
            round_monetary_limits: config.suppression.round_monetary_limits,
            analysis_date: config.features.analysis_date.map(|d| d.to_string()),
        }
    }
}

/// Compute SHA-256 hash of content, hex encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
