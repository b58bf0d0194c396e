//! Gauss hypergeometric function 2F1(a, b; c; z).
//!
//! The BG/NBD conditional expectation integrates the purchase rate over the
//! posterior dropout distribution, which reduces to a single 2F1 evaluation
//! with `z = t / (alpha + T + t)`. That argument is always in `[0, 1)`, so the
//! power series is sufficient; the Euler transformation is provided for
//! parameter regions where the direct series overflows.

const HYP2F1_MAX_TERMS: usize = 20_000;
const HYP2F1_EPS: f64 = 1.0e-14;

/// Gauss hypergeometric function by direct power series, for `|z| < 1`.
///
/// Returns NaN outside the supported domain, at the poles `c = 0, -1, -2, ...`
/// and when the series fails to converge within the term budget.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if a.is_nan() || b.is_nan() || c.is_nan() || z.is_nan() {
        return f64::NAN;
    }
    if z.abs() >= 1.0 {
        return f64::NAN;
    }
    if c <= 0.0 && c == c.round() {
        return f64::NAN;
    }
    if z == 0.0 || a == 0.0 || b == 0.0 {
        return 1.0;
    }

    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..HYP2F1_MAX_TERMS {
        let kf = k as f64;
        let ratio = (a + kf) * (b + kf) / ((c + kf) * (kf + 1.0)) * z;
        term *= ratio;
        sum += term;
        if !sum.is_finite() {
            return f64::NAN;
        }
        // Terminating series (a or b a non-positive integer).
        if term == 0.0 {
            return sum;
        }
        if ratio.abs() < 1.0 && term.abs() <= HYP2F1_EPS * sum.abs() {
            return sum;
        }
    }
    f64::NAN
}

/// 2F1 through the Euler transformation:
/// `2F1(a, b; c; z) = (1 - z)^(c - a - b) * 2F1(c - a, c - b; c; z)`.
pub fn hyp2f1_euler(a: f64, b: f64, c: f64, z: f64) -> f64 {
    let inner = hyp2f1(c - a, c - b, c, z);
    if inner.is_nan() {
        return f64::NAN;
    }
    (1.0 - z).powf(c - a - b) * inner
}

/// Natural log of 2F1, falling back to the Euler transformation when the
/// direct series is not finite or not positive.
pub fn log_hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    let direct = hyp2f1(a, b, c, z);
    if direct.is_finite() && direct > 0.0 {
        return direct.ln();
    }
    let inner = hyp2f1(c - a, c - b, c, z);
    if inner.is_finite() && inner > 0.0 {
        return inner.ln() + (c - a - b) * (-z).ln_1p();
    }
    f64::NAN
}
