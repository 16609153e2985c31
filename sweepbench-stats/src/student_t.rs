//! Student's t-distribution
//!
//! The CDF is expressed through the regularized incomplete beta function,
//! evaluated with the Lentz continued fraction. The quantile function has no
//! closed form and is found by bisection on the CDF, which is monotone in `x`.
//! Past [`NORMAL_LIMIT_DF`] degrees of freedom the standard normal stands in
//! for t.

use std::f64::consts::PI;

use crate::StatsError;

/// Absolute bracket width at which root finding stops
pub const ACCURACY: f64 = 1e-9;

/// Iteration cap for bisection
pub const MAX_ITERATIONS: usize = 128;

/// Upper bracket doublings tried before giving up on a quantile
const MAX_BRACKET_DOUBLINGS: usize = 64;

/// Degrees of freedom above which the CDF is the standard normal's. The
/// incomplete beta loses precision faster than t approaches the normal
/// beyond this point.
pub const NORMAL_LIMIT_DF: usize = 100_000_000;

/// Shapes at or above this use the Stirling series for log-gamma differences
const STIRLING_MIN_SHAPE: f64 = 10.0;

/// Iteration cap for the incomplete beta continued fraction
const MAX_CONTINUED_FRACTION_TERMS: usize = 10_000;
const CONTINUED_FRACTION_EPSILON: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x > 0` (Lanczos approximation)
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `ln Γ(x) - ((x - 1/2) ln x - x + ln(2π)/2)` for large `x`
fn stirling_correction(x: f64) -> f64 {
    let x2 = x * x;
    (1.0 / 12.0 - (1.0 / 360.0 - (1.0 / 1260.0 - 1.0 / (1680.0 * x2)) / x2) / x2) / x
}

/// `ln B(a, b)`. When one shape is large, `ln Γ(a + b) - ln Γ(max)` is
/// taken from the Stirling series so the two large terms never cancel.
fn ln_beta(a: f64, b: f64) -> f64 {
    let (small, large) = if a < b { (a, b) } else { (b, a) };
    if large < STIRLING_MIN_SHAPE {
        return ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    }
    let sum = large + small;
    let ln_gamma_ratio = (large - 0.5) * (small / large).ln_1p() + small * sum.ln() - small
        + stirling_correction(sum)
        - stirling_correction(large);
    ln_gamma(small) - ln_gamma_ratio
}

/// Regularized incomplete beta function `I_x(a, b)` for `a, b > 0`.
///
/// `x` is clamped to [0, 1].
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> Result<f64, StatsError> {
    incomplete_beta(a, b, x, 1.0 - x)
}

/// `I_x(a, b)` with `y = 1 - x` supplied by the caller, who can often
/// compute it without the rounding of `1.0 - x`.
fn incomplete_beta(a: f64, b: f64, x: f64, y: f64) -> Result<f64, StatsError> {
    if x <= 0.0 {
        return Ok(0.0);
    }
    if y <= 0.0 {
        return Ok(1.0);
    }

    let ln_x = if x > 0.5 { (-y).ln_1p() } else { x.ln() };
    let ln_y = if y > 0.5 { (-x).ln_1p() } else { y.ln() };
    let front = (a * ln_x + b * ln_y - ln_beta(a, b)).exp();

    // The continued fraction converges fastest below this point; use the
    // symmetry I_x(a, b) = 1 - I_{1-x}(b, a) above it.
    if x < (a + 1.0) / (a + b + 2.0) {
        Ok(front * beta_continued_fraction(a, b, x)? / a)
    } else {
        Ok(1.0 - front * beta_continued_fraction(b, a, y)? / b)
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> Result<f64, StatsError> {
    let clamp = |v: f64| if v.abs() < FPMIN { FPMIN } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_CONTINUED_FRACTION_TERMS {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < CONTINUED_FRACTION_EPSILON {
            return Ok(h);
        }
    }

    Err(StatsError::ConvergenceFailure { iterations: MAX_CONTINUED_FRACTION_TERMS })
}

/// Upper regularized incomplete gamma function `Q(a, x)` for `a > 0`:
/// a power series below `x = a + 1`, a Lentz continued fraction above.
fn upper_incomplete_gamma(a: f64, x: f64) -> Result<f64, StatsError> {
    if x <= 0.0 {
        return Ok(1.0);
    }
    let ln_front = a * x.ln() - x - ln_gamma(a);

    if x < a + 1.0 {
        let mut denom = a;
        let mut term = 1.0 / a;
        let mut sum = term;
        for _ in 0..MAX_CONTINUED_FRACTION_TERMS {
            denom += 1.0;
            term *= x / denom;
            sum += term;
            if term.abs() < sum.abs() * CONTINUED_FRACTION_EPSILON {
                return Ok(1.0 - sum * ln_front.exp());
            }
        }
        return Err(StatsError::ConvergenceFailure { iterations: MAX_CONTINUED_FRACTION_TERMS });
    }

    let clamp = |v: f64| if v.abs() < FPMIN { FPMIN } else { v };
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_CONTINUED_FRACTION_TERMS {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = 1.0 / clamp(an * d + b);
        c = clamp(b + an / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < CONTINUED_FRACTION_EPSILON {
            return Ok(ln_front.exp() * h);
        }
    }
    Err(StatsError::ConvergenceFailure { iterations: MAX_CONTINUED_FRACTION_TERMS })
}

/// Cumulative distribution function of the standard normal distribution.
pub fn standard_normal_cdf(z: f64) -> Result<f64, StatsError> {
    if z == 0.0 {
        return Ok(0.5);
    }
    // erfc(|z| / sqrt 2) = Q(1/2, z^2 / 2)
    let tail = upper_incomplete_gamma(0.5, z * z / 2.0)?;
    if z > 0.0 {
        Ok(1.0 - 0.5 * tail)
    } else {
        Ok(0.5 * tail)
    }
}

/// Cumulative distribution function of Student's t with `df` degrees of freedom.
pub fn student_t_cdf(x: f64, df: usize) -> Result<f64, StatsError> {
    if df == 0 {
        return Err(StatsError::InsufficientSamples { found: 1, required: 2 });
    }
    if df > NORMAL_LIMIT_DF {
        return standard_normal_cdf(x);
    }
    if x == 0.0 {
        return Ok(0.5);
    }
    let df = df as f64;
    let x2 = x * x;
    let tail = incomplete_beta(df / 2.0, 0.5, df / (df + x2), x2 / (df + x2))?;
    if x > 0.0 {
        Ok(1.0 - 0.5 * tail)
    } else {
        Ok(0.5 * tail)
    }
}

/// Find `x` in `[lo, hi]` such that `f(x) == target` for a monotonically
/// increasing `f`, by bisection.
///
/// The bracket must contain the root. Stops once the bracket is narrower than
/// [`ACCURACY`] or no representable midpoint remains; fails with
/// `ConvergenceFailure` after [`MAX_ITERATIONS`] halvings.
pub fn find_root<F>(target: f64, lo: f64, hi: f64, mut f: F) -> Result<f64, StatsError>
where
    F: FnMut(f64) -> Result<f64, StatsError>,
{
    let (mut lo, mut hi) = (lo, hi);
    for _ in 0..MAX_ITERATIONS {
        let mid = lo + (hi - lo) / 2.0;
        if hi - lo < ACCURACY || mid <= lo || mid >= hi {
            return Ok(mid);
        }
        if f(mid)? < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Err(StatsError::ConvergenceFailure { iterations: MAX_ITERATIONS })
}

/// Inverse CDF of Student's t: the `x` with `P(T <= x) = p` for `df` degrees
/// of freedom.
///
/// `inverse_student_t(1, 0.95)` is about 6.31375. `df == 0` has no meaningful
/// quantile and is reported as `InsufficientSamples`.
pub fn inverse_student_t(df: usize, p: f64) -> Result<f64, StatsError> {
    if df == 0 {
        return Err(StatsError::InsufficientSamples { found: 1, required: 2 });
    }
    if !(p > 0.0 && p < 1.0) {
        return Err(StatsError::InvalidProbability(p));
    }
    if p == 0.5 {
        return Ok(0.0);
    }
    if p < 0.5 {
        return inverse_student_t(df, 1.0 - p).map(|x| -x);
    }

    let mut upper = 1.0;
    let mut doublings = 0;
    while student_t_cdf(upper, df)? < p {
        doublings += 1;
        if doublings > MAX_BRACKET_DOUBLINGS {
            return Err(StatsError::ConvergenceFailure { iterations: doublings });
        }
        upper *= 2.0;
    }

    find_root(p, 0.0, upper, |x| student_t_cdf(x, df))
}
