//! Gamma-Gamma model of average transaction value.
//!
//! Individual transaction values are Gamma(p, nu) with customer-specific
//! `nu ~ Gamma(q, v)` across the population. Only customers' frequency and
//! mean spend are needed; the model assumes spend is independent of how
//! often a customer buys.

use cltv_config::MonetaryModelSettings;
use cltv_math::{log_gamma, NelderMead};
use serde::{Deserialize, Serialize};

use super::{
    accept_minimum, check_fit_inputs, FitDiagnostics, FittedMonetaryModel, ModelError,
    ModelSummary, MonetaryEstimator,
};

pub const MODEL_NAME: &str = "Gamma-Gamma";

/// Rescaled maximum monetary average used while fitting.
const VALUE_SCALE_TARGET: f64 = 10.0;

/// Gamma-Gamma population parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

impl GammaGammaParams {
    /// Individual log-likelihood of mean spend `m` over `x` transactions.
    pub fn log_likelihood(&self, x: f64, m: f64) -> f64 {
        let GammaGammaParams { p, q, v } = *self;
        let px = p * x;
        log_gamma(px + q) - log_gamma(px) - log_gamma(q) + q * v.ln() + (px - 1.0) * m.ln()
            + px * x.ln()
            - (px + q) * (x * m + v).ln()
    }

    /// Population mean of the average transaction value, `v p / (q - 1)`.
    ///
    /// Infinite when `q <= 1`.
    pub fn population_mean(&self) -> f64 {
        if self.q <= 1.0 {
            return f64::INFINITY;
        }
        self.v * self.p / (self.q - 1.0)
    }

    /// Weighted blend of the population mean and the customer's own mean.
    pub fn conditional_expected_average_value(&self, x: f64, m: f64) -> f64 {
        let px = self.p * x;
        let weight = px / (px + self.q - 1.0);
        (1.0 - weight) * self.population_mean() + weight * m
    }
}

/// Fits [`GammaGammaParams`] by penalized maximum likelihood.
///
/// Monetary averages are rescaled so the largest is `VALUE_SCALE_TARGET`
/// before fitting, and the L2 penalty applies to `p`, `q` and the rescaled
/// `v`. The penalty therefore does not depend on the currency unit: scaling
/// every spend by a constant leaves `p` and `q` unchanged and scales `v` by
/// the same constant. Fitting raw values with the penalty on `v` would make
/// its strength depend on the unit instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaGammaEstimator {
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

impl Default for GammaGammaEstimator {
    fn default() -> Self {
        GammaGammaEstimator {
            penalizer: 0.01,
            optimizer: NelderMead::default(),
        }
    }
}

impl From<&MonetaryModelSettings> for GammaGammaEstimator {
    fn from(settings: &MonetaryModelSettings) -> Self {
        GammaGammaEstimator {
            penalizer: settings.penalizer,
            optimizer: settings.optimizer,
        }
    }
}

impl MonetaryEstimator for GammaGammaEstimator {
    type Fitted = FittedGammaGamma;

    fn fit(&self, frequency: &[f64], monetary_avg: &[f64]) -> Result<FittedGammaGamma, ModelError> {
        let n = check_fit_inputs(
            MODEL_NAME,
            &[("frequency", frequency), ("monetary_avg", monetary_avg)],
        )?;
        if frequency.iter().any(|&x| x <= 0.0) || monetary_avg.iter().any(|&m| m <= 0.0) {
            return Err(ModelError::DegenerateInput {
                model: MODEL_NAME,
                reason: "frequency and monetary_avg must be positive".to_string(),
            });
        }

        let max_m = monetary_avg.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let scale = VALUE_SCALE_TARGET / max_m;
        let m_scaled: Vec<f64> = monetary_avg.iter().map(|m| m * scale).collect();

        let penalizer = self.penalizer;
        let objective = |log_params: &[f64]| {
            let params = GammaGammaParams {
                p: log_params[0].exp(),
                q: log_params[1].exp(),
                v: log_params[2].exp(),
            };
            let total: f64 = frequency
                .iter()
                .zip(&m_scaled)
                .map(|(&x, &m)| params.log_likelihood(x, m))
                .sum();
            let penalty = params.p.powi(2) + params.q.powi(2) + params.v.powi(2);
            -total / n as f64 + penalizer * penalty
        };

        let minimum = self.optimizer.minimize(objective, &[0.0; 3]);
        let fitted = accept_minimum(MODEL_NAME, &minimum)?;
        let params = GammaGammaParams {
            p: fitted[0],
            q: fitted[1],
            v: fitted[2] / scale,
        };

        if params.q <= 1.0 {
            return Err(ModelError::InvalidParameters {
                model: MODEL_NAME,
                detail: format!("q = {:.6} <= 1, population mean spend is undefined", params.q),
            });
        }

        Ok(FittedGammaGamma {
            params,
            diagnostics: FitDiagnostics::from_minimum(MODEL_NAME, n, &minimum),
        })
    }
}

/// A fitted Gamma-Gamma model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedGammaGamma {
    pub params: GammaGammaParams,
    pub diagnostics: FitDiagnostics,
}

impl FittedMonetaryModel for FittedGammaGamma {
    fn conditional_expected_average_value(&self, frequency: f64, monetary_avg: f64) -> f64 {
        self.params
            .conditional_expected_average_value(frequency, monetary_avg)
    }

    fn summary(&self) -> ModelSummary {
        let p = self.params;
        ModelSummary {
            parameters: vec![
                ("p".to_string(), p.p),
                ("q".to_string(), p.q),
                ("v".to_string(), p.v),
            ],
            diagnostics: self.diagnostics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn log_likelihood_matches_closed_form() {
        // p = q = v = 1, x = 1, m = 1:
        // lgamma(2) - lgamma(1) - lgamma(1) + 0 + 0 + 0 - 2 ln 2
        let params = GammaGammaParams { p: 1.0, q: 1.0, v: 1.0 };
        assert!(approx(params.log_likelihood(1.0, 1.0), -2.0 * 2f64.ln(), 1e-10));
    }

    #[test]
    fn conditional_value_shrinks_towards_population_mean() {
        let params = GammaGammaParams { p: 6.0, q: 4.0, v: 15.0 };
        let population = params.population_mean();
        assert!(approx(population, 30.0, 1e-12));

        // Few purchases: pulled towards 30; many purchases: close to own mean.
        let few = params.conditional_expected_average_value(2.0, 100.0);
        let many = params.conditional_expected_average_value(50.0, 100.0);
        assert!(few > population && few < 100.0);
        assert!(many > few && many < 100.0);

        // w = px / (px + q - 1) = 12 / 15
        let expected = (1.0 - 0.8) * 30.0 + 0.8 * 100.0;
        assert!(approx(few, expected, 1e-12));
    }

    #[test]
    fn fit_recovers_heterogeneous_spend() {
        let frequency: Vec<f64> = (0..40).map(|i| 2.0 + (i % 6) as f64).collect();
        let monetary: Vec<f64> = (0..40)
            .map(|i| 80.0 + ((i * 37) % 23) as f64 * 3.5)
            .collect();
        let fitted = GammaGammaEstimator::default().fit(&frequency, &monetary).unwrap();
        assert!(fitted.diagnostics.converged);
        assert!(fitted.params.q > 1.0);

        let mean_spend = monetary.iter().sum::<f64>() / monetary.len() as f64;
        let mean_pred: f64 = frequency
            .iter()
            .zip(&monetary)
            .map(|(&x, &m)| fitted.conditional_expected_average_value(x, m))
            .sum::<f64>()
            / monetary.len() as f64;
        assert!(
            (mean_pred - mean_spend).abs() / mean_spend < 0.25,
            "mean_pred={mean_pred} mean_spend={mean_spend}"
        );
    }

    #[test]
    fn fit_is_invariant_to_currency_unit() {
        let frequency: Vec<f64> = (0..30).map(|i| 2.0 + (i % 4) as f64).collect();
        let monetary: Vec<f64> = (0..30)
            .map(|i| 40.0 + ((i * 11) % 17) as f64 * 6.0)
            .collect();
        // A power of two keeps the rescaled inputs bit-identical.
        let unit = 64.0;
        let in_units: Vec<f64> = monetary.iter().map(|m| m * unit).collect();

        let estimator = GammaGammaEstimator::default();
        let base = estimator.fit(&frequency, &monetary).unwrap().params;
        let scaled = estimator.fit(&frequency, &in_units).unwrap().params;
        assert!(approx(base.p, scaled.p, 1e-9));
        assert!(approx(base.q, scaled.q, 1e-9));
        assert!(approx(base.v * unit, scaled.v, 1e-9));
    }

    #[test]
    fn fit_rejects_non_positive_spend() {
        let err = GammaGammaEstimator::default()
            .fit(&[2.0, 3.0], &[10.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, ModelError::DegenerateInput { .. }));
    }

    #[test]
    fn fit_requires_two_customers() {
        let err = GammaGammaEstimator::default().fit(&[2.0], &[10.0]).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData { .. }));
        let common: cltv_common::Error = err.into();
        assert_eq!(common.code(), 31);
    }
}
