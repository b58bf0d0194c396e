//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::settings::PipelineConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 12,
            ValidationError::SemanticError(_) => 13,
            ValidationError::InvalidValue { .. } => 14,
            ValidationError::VersionMismatch { .. } => 15,
        }
    }
}

/// Largest accepted `features.reference_offset_days` (ten years).
pub const MAX_REFERENCE_OFFSET_DAYS: i64 = 3_650;

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate pipeline settings semantically.
pub fn validate_config(config: &PipelineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_suppression(config)?;
    validate_features(config)?;
    validate_forecast(config)?;
    validate_models(config)?;
    validate_cltv(config)?;

    Ok(())
}

fn validate_suppression(config: &PipelineConfig) -> ValidationResult<()> {
    let s = &config.suppression;
    for (field, q) in [
        ("suppression.lower_quantile", s.lower_quantile),
        ("suppression.upper_quantile", s.upper_quantile),
    ] {
        if !(0.0..=1.0).contains(&q) {
            return Err(invalid(field, format!("Must be in [0, 1], got {}", q)));
        }
    }
    if s.lower_quantile >= s.upper_quantile {
        return Err(ValidationError::SemanticError(format!(
            "suppression.lower_quantile ({}) must be below suppression.upper_quantile ({})",
            s.lower_quantile, s.upper_quantile
        )));
    }
    if !(s.iqr_multiplier.is_finite() && s.iqr_multiplier >= 0.0) {
        return Err(invalid(
            "suppression.iqr_multiplier",
            format!("Must be finite and non-negative, got {}", s.iqr_multiplier),
        ));
    }
    Ok(())
}

fn validate_features(config: &PipelineConfig) -> ValidationResult<()> {
    let offset = config.features.reference_offset_days;
    if !(0..=MAX_REFERENCE_OFFSET_DAYS).contains(&offset) {
        return Err(invalid(
            "features.reference_offset_days",
            format!(
                "Must be in [0, {}], got {}",
                MAX_REFERENCE_OFFSET_DAYS, offset
            ),
        ));
    }
    Ok(())
}

fn validate_forecast(config: &PipelineConfig) -> ValidationResult<()> {
    let f = &config.forecast;
    if f.horizon1_months == 0 {
        return Err(invalid(
            "forecast.horizon1_months",
            "Must be at least 1".to_string(),
        ));
    }
    if f.horizon1_months > f.horizon2_months {
        return Err(ValidationError::SemanticError(format!(
            "forecast horizons must be ordered: horizon1_months={} > horizon2_months={}",
            f.horizon1_months, f.horizon2_months
        )));
    }
    if !(f.weeks_per_month.is_finite() && f.weeks_per_month > 0.0) {
        return Err(invalid(
            "forecast.weeks_per_month",
            format!("Must be positive, got {}", f.weeks_per_month),
        ));
    }
    Ok(())
}

fn validate_models(config: &PipelineConfig) -> ValidationResult<()> {
    for (prefix, penalizer, optimizer) in [
        (
            "frequency_model",
            config.frequency_model.penalizer,
            &config.frequency_model.optimizer,
        ),
        (
            "monetary_model",
            config.monetary_model.penalizer,
            &config.monetary_model.optimizer,
        ),
    ] {
        if !(penalizer.is_finite() && penalizer >= 0.0) {
            return Err(invalid(
                &format!("{}.penalizer", prefix),
                format!("Must be finite and non-negative, got {}", penalizer),
            ));
        }
        if optimizer.max_iterations == 0 {
            return Err(invalid(
                &format!("{}.optimizer.max_iterations", prefix),
                "Must be at least 1".to_string(),
            ));
        }
        if !(optimizer.tolerance.is_finite() && optimizer.tolerance > 0.0) {
            return Err(invalid(
                &format!("{}.optimizer.tolerance", prefix),
                format!("Must be positive, got {}", optimizer.tolerance),
            ));
        }
        if !(optimizer.initial_step.is_finite() && optimizer.initial_step > 0.0) {
            return Err(invalid(
                &format!("{}.optimizer.initial_step", prefix),
                format!("Must be positive, got {}", optimizer.initial_step),
            ));
        }
    }
    Ok(())
}

fn validate_cltv(config: &PipelineConfig) -> ValidationResult<()> {
    let c = &config.cltv;
    if c.time == 0 {
        return Err(invalid("cltv.time", "Must be at least 1 month".to_string()));
    }
    if !(c.discount_rate.is_finite() && c.discount_rate > -1.0) {
        return Err(invalid(
            "cltv.discount_rate",
            format!("Must be greater than -1, got {}", c.discount_rate),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate_config(&PipelineConfig::default()).unwrap();
    }

    #[test]
    fn rejects_inverted_quantiles() {
        let mut config = PipelineConfig::default();
        config.suppression.lower_quantile = 0.99;
        config.suppression.upper_quantile = 0.01;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::SemanticError(_))
        ));
    }

    #[test]
    fn rejects_negative_penalizer() {
        let mut config = PipelineConfig::default();
        config.monetary_model.penalizer = -0.5;
        match validate_config(&config) {
            Err(ValidationError::InvalidValue { field, .. }) => {
                assert_eq!(field, "monetary_model.penalizer")
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn rejects_discount_rate_at_minus_one() {
        let mut config = PipelineConfig::default();
        config.cltv.discount_rate = -1.0;
        assert!(validate_config(&config).is_err());
        config.cltv.discount_rate = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bounds_reference_offset_days() {
        let mut config = PipelineConfig::default();
        config.features.reference_offset_days = MAX_REFERENCE_OFFSET_DAYS;
        assert!(validate_config(&config).is_ok());

        for offset in [-1, MAX_REFERENCE_OFFSET_DAYS + 1, i64::MAX / 2] {
            config.features.reference_offset_days = offset;
            match validate_config(&config) {
                Err(ValidationError::InvalidValue { field, .. }) => {
                    assert_eq!(field, "features.reference_offset_days")
                }
                other => panic!("expected InvalidValue for {}, got {:?}", offset, other),
            }
        }
    }

    #[test]
    fn rejects_unordered_horizons() {
        let mut config = PipelineConfig::default();
        config.forecast.horizon1_months = 9;
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::SemanticError(_))
        ));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut config = PipelineConfig::default();
        config.schema_version = "0.9.0".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::VersionMismatch { .. })
        ));
    }
}
