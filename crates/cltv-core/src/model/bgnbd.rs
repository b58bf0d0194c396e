//! BG/NBD (beta-geometric / negative binomial) purchase model.
//!
//! While alive, a customer buys as a Poisson process with rate
//! `lambda ~ Gamma(r, alpha)`; after each purchase they drop out with
//! probability `p ~ Beta(a, b)`. Observations per customer are the
//! frequency `x`, recency `t_x` and tenure `T`; the pipeline passes the
//! combined order count as `x`.
//!
//! Fitting maximizes the mean log-likelihood minus an L2 penalty on the
//! natural-space parameters, searching in log space. Times are rescaled to
//! `max(T) = 10` for conditioning and `alpha` is unscaled afterwards.

use cltv_config::FrequencyModelSettings;
use cltv_math::{log_add_exp, log_beta, log_gamma_ratio, log_hyp2f1, NelderMead};
use serde::{Deserialize, Serialize};

use super::{
    accept_minimum, check_fit_inputs, FitDiagnostics, FittedFrequencyModel, FrequencyEstimator,
    ModelError, ModelSummary,
};
use crate::data::CustomerFeatureRecord;

pub const MODEL_NAME: &str = "BG/NBD";

/// Rescaled maximum tenure used while fitting.
const TIME_SCALE_TARGET: f64 = 10.0;

/// BG/NBD population parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BgNbdParams {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

impl BgNbdParams {
    /// Individual log-likelihood of `(x, t_x, T)`.
    pub fn log_likelihood(&self, x: f64, t_x: f64, t: f64) -> f64 {
        let BgNbdParams { r, alpha, a, b } = *self;
        let a1 = log_gamma_ratio(r, x) + r * alpha.ln();
        let a2 = log_beta(a, b + x) - log_beta(a, b);
        let a3 = -(r + x) * (alpha + t).ln();
        if x > 0.0 {
            let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + t_x).ln();
            a1 + a2 + log_add_exp(a3, a4)
        } else {
            a1 + a2 + a3
        }
    }

    /// Expected purchases in `(T, T + horizon]` given `(x, t_x, T)`.
    pub fn expected_purchases(&self, horizon: f64, x: f64, t_x: f64, t: f64) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let BgNbdParams { r, alpha, a, b } = *self;

        let hyp_a = r + x;
        let hyp_b = b + x;
        let hyp_c = a + b + x - 1.0;
        let z = horizon / (alpha + t + horizon);
        let ln_hyp = log_hyp2f1(hyp_a, hyp_b, hyp_c, z);

        let first = (a + b + x - 1.0) / (a - 1.0);
        let second = 1.0 - (ln_hyp + (r + x) * ((alpha + t) / (alpha + horizon + t)).ln()).exp();
        let numerator = first * second;

        let denominator = if x > 0.0 {
            1.0 + (a / (b + x - 1.0)) * ((alpha + t) / (alpha + t_x)).powf(r + x)
        } else {
            1.0
        };
        numerator / denominator
    }

    /// Probability the customer is still alive at `T`.
    pub fn probability_alive(&self, x: f64, t_x: f64, t: f64) -> f64 {
        if x == 0.0 {
            return 1.0;
        }
        let BgNbdParams { r, alpha, a, b } = *self;
        let log_ratio = (r + x) * ((alpha + t) / (alpha + t_x)).ln() + (a / (b + x - 1.0)).ln();
        1.0 / (1.0 + log_ratio.exp())
    }

    fn from_vec(params: &[f64]) -> Self {
        BgNbdParams {
            r: params[0],
            alpha: params[1],
            a: params[2],
            b: params[3],
        }
    }
}

/// Fits [`BgNbdParams`] by penalized maximum likelihood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgNbdEstimator {
    pub penalizer: f64,
    pub optimizer: NelderMead,
}

impl Default for BgNbdEstimator {
    fn default() -> Self {
        BgNbdEstimator {
            penalizer: 0.001,
            optimizer: NelderMead::default(),
        }
    }
}

impl From<&FrequencyModelSettings> for BgNbdEstimator {
    fn from(settings: &FrequencyModelSettings) -> Self {
        BgNbdEstimator {
            penalizer: settings.penalizer,
            optimizer: settings.optimizer,
        }
    }
}

impl BgNbdEstimator {
    /// Fit directly on `(x, t_x, T)` columns.
    pub fn fit_columns(&self, x: &[f64], t_x: &[f64], t: &[f64]) -> Result<FittedBgNbd, ModelError> {
        let n = check_fit_inputs(
            MODEL_NAME,
            &[("frequency", x), ("recency", t_x), ("tenure", t)],
        )?;

        let max_t = t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_t <= 0.0 {
            return Err(ModelError::DegenerateInput {
                model: MODEL_NAME,
                reason: "all tenures are zero".to_string(),
            });
        }
        if x.iter().any(|&v| v < 0.0) || t_x.iter().zip(t).any(|(&rec, &ten)| rec < 0.0 || rec > ten) {
            return Err(ModelError::DegenerateInput {
                model: MODEL_NAME,
                reason: "require frequency >= 0 and 0 <= recency <= tenure".to_string(),
            });
        }

        let scale = TIME_SCALE_TARGET / max_t;
        let t_x_scaled: Vec<f64> = t_x.iter().map(|v| v * scale).collect();
        let t_scaled: Vec<f64> = t.iter().map(|v| v * scale).collect();

        let penalizer = self.penalizer;
        let objective = |log_params: &[f64]| {
            let params: Vec<f64> = log_params.iter().map(|v| v.exp()).collect();
            let p = BgNbdParams::from_vec(&params);
            let total: f64 = (0..n)
                .map(|i| p.log_likelihood(x[i], t_x_scaled[i], t_scaled[i]))
                .sum();
            let penalty: f64 = params.iter().map(|v| v * v).sum();
            -total / n as f64 + penalizer * penalty
        };

        let minimum = self.optimizer.minimize(objective, &[0.0; 4]);
        let fitted = accept_minimum(MODEL_NAME, &minimum)?;

        let mut params = BgNbdParams::from_vec(&fitted);
        params.alpha /= scale;

        Ok(FittedBgNbd {
            params,
            diagnostics: FitDiagnostics::from_minimum(MODEL_NAME, n, &minimum),
        })
    }
}

impl FrequencyEstimator for BgNbdEstimator {
    type Fitted = FittedBgNbd;

    fn fit(&self, observations: &[CustomerFeatureRecord]) -> Result<FittedBgNbd, ModelError> {
        let x: Vec<f64> = observations.iter().map(|o| o.frequency as f64).collect();
        let t_x: Vec<f64> = observations.iter().map(|o| o.recency_weeks).collect();
        let t: Vec<f64> = observations.iter().map(|o| o.tenure_weeks).collect();
        self.fit_columns(&x, &t_x, &t)
    }
}

/// A fitted BG/NBD model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedBgNbd {
    pub params: BgNbdParams,
    pub diagnostics: FitDiagnostics,
}

impl FittedFrequencyModel for FittedBgNbd {
    fn expected_purchases(&self, horizon: f64, frequency: f64, recency: f64, tenure: f64) -> f64 {
        self.params.expected_purchases(horizon, frequency, recency, tenure)
    }

    fn summary(&self) -> ModelSummary {
        let p = self.params;
        ModelSummary {
            parameters: vec![
                ("r".to_string(), p.r),
                ("alpha".to_string(), p.alpha),
                ("a".to_string(), p.a),
                ("b".to_string(), p.b),
            ],
            diagnostics: self.diagnostics.clone(),
        }
    }
}
