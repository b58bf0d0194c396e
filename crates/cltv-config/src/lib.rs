//! CLTV pipeline configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for cltv.json, with defaults for every field
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for run reports

pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use settings::{
    CltvSettings, FeatureSettings, ForecastSettings, FrequencyModelSettings,
    MonetaryModelSettings, PeriodUnit, PipelineConfig, SuppressionSettings,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult, MAX_REFERENCE_OFFSET_DAYS};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
