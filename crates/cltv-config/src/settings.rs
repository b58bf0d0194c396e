//! Pipeline settings.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the standard six-month weekly analysis.

use chrono::NaiveDate;
use cltv_math::NelderMead;
use serde::{Deserialize, Serialize};

/// Complete pipeline configuration (`cltv.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub suppression: SuppressionSettings,

    #[serde(default)]
    pub features: FeatureSettings,

    #[serde(default)]
    pub forecast: ForecastSettings,

    #[serde(default)]
    pub frequency_model: FrequencyModelSettings,

    #[serde(default)]
    pub monetary_model: MonetaryModelSettings,

    #[serde(default)]
    pub cltv: CltvSettings,

    /// Worker threads for per-customer stages (0 = one per core).
    #[serde(default)]
    pub threads: usize,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            suppression: SuppressionSettings::default(),
            features: FeatureSettings::default(),
            forecast: ForecastSettings::default(),
            frequency_model: FrequencyModelSettings::default(),
            monetary_model: MonetaryModelSettings::default(),
            cltv: CltvSettings::default(),
            threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Load settings from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::validate::ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::validate::ValidationError::IoError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, crate::validate::ValidationError> {
        serde_json::from_str(json).map_err(|e| {
            crate::validate::ValidationError::ParseError(format!("Invalid JSON: {}", e))
        })
    }
}

/// Outlier suppression thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionSettings {
    /// Lower quantile used as "Q1" (default 0.01).
    #[serde(default = "default_lower_quantile")]
    pub lower_quantile: f64,

    /// Upper quantile used as "Q3" (default 0.99).
    #[serde(default = "default_upper_quantile")]
    pub upper_quantile: f64,

    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,

    /// Round replacement limits for the monetary columns too.
    /// Count columns are always rounded.
    #[serde(default = "default_true")]
    pub round_monetary_limits: bool,
}

fn default_lower_quantile() -> f64 {
    0.01
}
fn default_upper_quantile() -> f64 {
    0.99
}
fn default_iqr_multiplier() -> f64 {
    1.5
}
fn default_true() -> bool {
    true
}

impl Default for SuppressionSettings {
    fn default() -> Self {
        Self {
            lower_quantile: default_lower_quantile(),
            upper_quantile: default_upper_quantile(),
            iqr_multiplier: default_iqr_multiplier(),
            round_monetary_limits: true,
        }
    }
}

/// Feature derivation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Days added to the latest last-order date to get the reference date.
    #[serde(default = "default_reference_offset_days")]
    pub reference_offset_days: i64,

    /// Explicit analysis date; overrides the derived reference date.
    #[serde(default)]
    pub analysis_date: Option<NaiveDate>,
}

fn default_reference_offset_days() -> i64 {
    2
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            reference_offset_days: default_reference_offset_days(),
            analysis_date: None,
        }
    }
}

/// Expected-sales horizons reported per customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    #[serde(default = "default_horizon1_months")]
    pub horizon1_months: u32,

    #[serde(default = "default_horizon2_months")]
    pub horizon2_months: u32,

    /// Weeks per month when converting horizons (4 gives 12 and 24 weeks).
    #[serde(default = "default_weeks_per_month")]
    pub weeks_per_month: f64,
}

fn default_horizon1_months() -> u32 {
    3
}
fn default_horizon2_months() -> u32 {
    6
}
fn default_weeks_per_month() -> f64 {
    4.0
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon1_months: default_horizon1_months(),
            horizon2_months: default_horizon2_months(),
            weeks_per_month: default_weeks_per_month(),
        }
    }
}

impl ForecastSettings {
    pub fn horizon1_weeks(&self) -> f64 {
        self.horizon1_months as f64 * self.weeks_per_month
    }

    pub fn horizon2_weeks(&self) -> f64 {
        self.horizon2_months as f64 * self.weeks_per_month
    }
}

/// BG/NBD fitting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyModelSettings {
    #[serde(default = "default_frequency_penalizer")]
    pub penalizer: f64,

    #[serde(default)]
    pub optimizer: NelderMead,
}

fn default_frequency_penalizer() -> f64 {
    0.001
}

impl Default for FrequencyModelSettings {
    fn default() -> Self {
        Self {
            penalizer: default_frequency_penalizer(),
            optimizer: NelderMead::default(),
        }
    }
}

/// Gamma-Gamma fitting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryModelSettings {
    #[serde(default = "default_monetary_penalizer")]
    pub penalizer: f64,

    #[serde(default)]
    pub optimizer: NelderMead,
}

fn default_monetary_penalizer() -> f64 {
    0.01
}

impl Default for MonetaryModelSettings {
    fn default() -> Self {
        Self {
            penalizer: default_monetary_penalizer(),
            optimizer: NelderMead::default(),
        }
    }
}

/// Unit of the model's time axis, relative to one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    #[default]
    Weekly,
    Monthly,
    Daily,
    Hourly,
}

impl PeriodUnit {
    /// Model periods per month.
    pub fn periods_per_month(self) -> f64 {
        match self {
            PeriodUnit::Weekly => 4.345,
            PeriodUnit::Monthly => 1.0,
            PeriodUnit::Daily => 30.0,
            PeriodUnit::Hourly => 720.0,
        }
    }
}

impl std::fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodUnit::Weekly => write!(f, "weekly"),
            PeriodUnit::Monthly => write!(f, "monthly"),
            PeriodUnit::Daily => write!(f, "daily"),
            PeriodUnit::Hourly => write!(f, "hourly"),
        }
    }
}

/// Lifetime value synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CltvSettings {
    /// Forecast horizon in months.
    #[serde(default = "default_time_months")]
    pub time: u32,

    #[serde(default)]
    pub freq: PeriodUnit,

    /// Monthly discount rate.
    #[serde(default = "default_discount_rate")]
    pub discount_rate: f64,
}

fn default_time_months() -> u32 {
    6
}
fn default_discount_rate() -> f64 {
    0.01
}

impl Default for CltvSettings {
    fn default() -> Self {
        Self {
            time: default_time_months(),
            freq: PeriodUnit::Weekly,
            discount_rate: default_discount_rate(),
        }
    }
}
