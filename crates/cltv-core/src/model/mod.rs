//! Statistical estimators behind a fit/predict seam.
//!
//! The pipeline only sees the traits; [`BgNbdEstimator`] and
//! [`GammaGammaEstimator`] are the in-tree implementations. Fitting is a
//! full-population barrier, prediction is per customer and must be callable
//! from worker threads.

pub mod bgnbd;
pub mod gamma_gamma;

pub use bgnbd::{BgNbdEstimator, BgNbdParams, FittedBgNbd};
pub use gamma_gamma::{FittedGammaGamma, GammaGammaEstimator, GammaGammaParams};

use cltv_math::Minimum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::CustomerFeatureRecord;

/// Fewest customers either estimator will fit.
pub const MIN_FIT_CUSTOMERS: usize = 2;

/// Errors raised while fitting or evaluating an estimator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{model} needs at least {required} customers, got {actual}")]
    InsufficientData {
        model: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("{model} input is degenerate: {reason}")]
    DegenerateInput { model: &'static str, reason: String },

    #[error("{model} optimizer did not converge after {iterations} iterations")]
    NotConverged { model: &'static str, iterations: usize },

    #[error("{model} objective is not finite at the optimum")]
    NonFiniteObjective { model: &'static str },

    #[error("{model} fitted invalid parameters: {detail}")]
    InvalidParameters { model: &'static str, detail: String },

    #[error("{model} produced a non-finite prediction for customer {customer_id}")]
    NonFinitePrediction { model: String, customer_id: String },
}

impl ModelError {
    pub fn model(&self) -> &str {
        match self {
            ModelError::InsufficientData { model, .. }
            | ModelError::DegenerateInput { model, .. }
            | ModelError::NotConverged { model, .. }
            | ModelError::NonFiniteObjective { model }
            | ModelError::InvalidParameters { model, .. } => model,
            ModelError::NonFinitePrediction { model, .. } => model,
        }
    }
}

impl From<ModelError> for cltv_common::Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InsufficientData {
                model,
                required,
                actual,
            } => cltv_common::Error::InsufficientData {
                model: model.to_string(),
                required,
                actual,
            },
            other => cltv_common::Error::FittingDivergence {
                model: other.model().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// How the optimizer got to the fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub model: String,
    /// Customers in the fit.
    pub customers: usize,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    /// Penalized mean negative log-likelihood at the optimum (scaled data).
    pub objective: f64,
}

impl FitDiagnostics {
    pub(crate) fn from_minimum(model: &str, customers: usize, minimum: &Minimum) -> Self {
        FitDiagnostics {
            model: model.to_string(),
            customers,
            iterations: minimum.iterations,
            evaluations: minimum.evaluations,
            converged: minimum.converged,
            objective: minimum.value,
        }
    }
}

/// Named parameters plus diagnostics, for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub parameters: Vec<(String, f64)>,
    pub diagnostics: FitDiagnostics,
}

/// Purchase-frequency / dropout estimator.
pub trait FrequencyEstimator {
    type Fitted: FittedFrequencyModel;

    fn fit(&self, observations: &[CustomerFeatureRecord]) -> Result<Self::Fitted, ModelError>;
}

/// A fitted purchase model.
pub trait FittedFrequencyModel: Send + Sync {
    /// Expected purchases in the next `horizon` periods for a customer with
    /// the given history.
    fn expected_purchases(&self, horizon: f64, frequency: f64, recency: f64, tenure: f64) -> f64;

    fn summary(&self) -> ModelSummary;
}

/// Per-transaction monetary value estimator.
pub trait MonetaryEstimator {
    type Fitted: FittedMonetaryModel;

    fn fit(&self, frequency: &[f64], monetary_avg: &[f64]) -> Result<Self::Fitted, ModelError>;
}

/// A fitted monetary model.
pub trait FittedMonetaryModel: Send + Sync {
    /// Shrinkage estimate of a customer's expected average transaction value.
    fn conditional_expected_average_value(&self, frequency: f64, monetary_avg: f64) -> f64;

    fn summary(&self) -> ModelSummary;
}

/// Checks shared by both fitters: enough customers, finite inputs.
pub(crate) fn check_fit_inputs(model: &'static str, columns: &[(&str, &[f64])]) -> Result<usize, ModelError> {
    let n = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
    if n < MIN_FIT_CUSTOMERS {
        return Err(ModelError::InsufficientData {
            model,
            required: MIN_FIT_CUSTOMERS,
            actual: n,
        });
    }
    for (name, column) in columns {
        if column.len() != n {
            return Err(ModelError::DegenerateInput {
                model,
                reason: format!("{} has {} values, expected {}", name, column.len(), n),
            });
        }
        if column.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::DegenerateInput {
                model,
                reason: format!("{} contains non-finite values", name),
            });
        }
    }
    Ok(n)
}

/// Turn an optimizer result into fitted natural-space parameters, or an error.
pub(crate) fn accept_minimum(model: &'static str, minimum: &Minimum) -> Result<Vec<f64>, ModelError> {
    if !minimum.value.is_finite() {
        return Err(ModelError::NonFiniteObjective { model });
    }
    if !minimum.converged {
        return Err(ModelError::NotConverged {
            model,
            iterations: minimum.iterations,
        });
    }
    let params: Vec<f64> = minimum.x.iter().map(|v| v.exp()).collect();
    if params.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(ModelError::InvalidParameters {
            model,
            detail: format!("{:?}", params),
        });
    }
    Ok(params)
}
