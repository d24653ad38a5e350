//! Log-domain primitives for categorical sampling and Bayesian scoring.
//!
//! The Gibbs engine accumulates cluster-assignment weights as running
//! log-space sums over an open-ended candidate set; these helpers keep that
//! accumulation stable for arbitrarily small unnormalized probabilities.

/// Numerical Recipes gammln coefficients (g = 5, n = 6).
const GAMMLN_COEFFS: [f64; 6] = [
    76.180_091_729_471_46,
    -86.505_320_329_416_77,
    24.014_098_240_830_91,
    -1.231_739_572_450_155,
    0.120_865_097_386_617_9e-2,
    -0.539_523_938_495_3e-5,
];

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Stable log(exp(a) + exp(b)).
///
/// The identity element is NEG_INFINITY, so a running fold over log-weights
/// may start from an empty accumulator without special cases.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if lo == f64::NEG_INFINITY || hi == f64::INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Stable log(sum(exp(values))).
///
/// NEG_INFINITY for an empty slice or all-NEG_INFINITY input; NaN poisons.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Natural log of the Gamma function for z > 0.
///
/// Lanczos approximation (Numerical Recipes gammln), accurate to roughly
/// 1e-10 over the positive reals. Non-positive or NaN input yields NaN;
/// every caller in this workspace passes counts shifted by a positive
/// prior, so reflection is not implemented.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z <= 0.0 {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    let tmp = z + 5.5;
    let tmp = tmp - (z + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for (i, coeff) in GAMMLN_COEFFS.iter().enumerate() {
        ser += coeff / (z + 1.0 + i as f64);
    }
    -tmp + (SQRT_2PI * ser / z).ln()
}

/// log B(a, b) = log Gamma(a) + log Gamma(b) - log Gamma(a + b).
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}
