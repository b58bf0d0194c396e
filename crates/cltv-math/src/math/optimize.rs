//! Derivative-free minimization (Nelder-Mead downhill simplex).
//!
//! Both CLTV estimators fit a handful of positive shape/scale parameters by
//! maximizing a penalized log-likelihood. The likelihoods are smooth but
//! their gradients involve digamma terms, so the fitters work in log-space
//! and minimize with a simplex search.
//!
//! Termination follows the Numerical Recipes `amoeba` criterion: the
//! fractional spread of objective values across the simplex falls below
//! `tolerance`. Non-finite objective values are treated as `+inf`, which
//! steers the simplex away from invalid regions.

use serde::{Deserialize, Serialize};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const TINY: f64 = 1.0e-20;

/// Nelder-Mead settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    /// Maximum number of simplex iterations.
    pub max_iterations: usize,
    /// Fractional tolerance on the objective spread.
    pub tolerance: f64,
    /// Offset of the initial simplex vertices along each axis.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            tolerance: 1.0e-10,
            initial_step: 0.5,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Objective evaluations performed.
    pub evaluations: usize,
    /// Whether the tolerance criterion was met before the iteration cap.
    pub converged: bool,
}

impl NelderMead {
    /// Create settings with explicit iteration cap and tolerance.
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
            ..Self::default()
        }
    }

    /// Minimize `f` starting from `x0`.
    pub fn minimize<F>(&self, f: F, x0: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = x0.len();
        let mut evaluations = 0usize;
        let mut eval = |x: &[f64]| {
            evaluations += 1;
            let v = f(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        if n == 0 {
            let value = eval(x0);
            return Minimum {
                x: Vec::new(),
                value,
                iterations: 0,
                evaluations,
                converged: true,
            };
        }

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        simplex.push(x0.to_vec());
        for i in 0..n {
            let mut vertex = x0.to_vec();
            vertex[i] += self.initial_step;
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < self.max_iterations {
            // Order vertices best to worst.
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let best = values[0];
            let worst = values[n];
            let spread = 2.0 * (worst - best).abs();
            if spread <= self.tolerance * (worst.abs() + best.abs()) + TINY {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..n)
                .map(|d| simplex[..n].iter().map(|v| v[d]).sum::<f64>() / n as f64)
                .collect();
            let along = |coef: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n])
                    .map(|(c, w)| c + coef * (c - w))
                    .collect()
            };

            let reflected = along(REFLECT);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = along(REFLECT * EXPAND);
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            // Contraction: outside if the reflection improved on the worst,
            // inside otherwise.
            let (contracted, threshold) = if f_reflected < worst {
                (along(REFLECT * CONTRACT), f_reflected)
            } else {
                (along(-CONTRACT), worst)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < threshold {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            // Shrink everything towards the best vertex.
            let anchor = simplex[0].clone();
            for i in 1..=n {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(&simplex[i])
                    .map(|(a, v)| a + SHRINK * (v - a))
                    .collect();
                values[i] = eval(&shrunk);
                simplex[i] = shrunk;
            }
        }

        let (best_idx, _) = values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap_or((0, &values[0]));

        Minimum {
            x: simplex[best_idx].clone(),
            value: values[best_idx],
            iterations,
            evaluations,
            converged,
        }
    }
}
