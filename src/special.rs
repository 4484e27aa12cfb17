//! Distribution primitives.
//!
//! Thin function-style wrappers over `statrs` for the Normal, Student-t,
//! F and chi-squared distributions, plus an implementation of the
//! Studentized range distribution (which `statrs` does not provide).
//!
//! Invalid parameters never panic: they yield `NaN`, which then flows into
//! the caller's statistic the same way a degenerate input would.
//!
//! # References
//!
//! - Copenhaver, M.D. & Holland, B.S. (1988). "Computation of the
//!   distribution of the maximum studentized range statistic with
//!   application to multiple significance testing of simple effects".
//!   *Journal of Statistical Computation and Simulation* 30, 1–15.
//! - Odeh, R.E. & Evans, J.O. (1974). "The percentage points of the normal
//!   distribution". *Applied Statistics* 23, 96–97.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

// ---------------------------------------------------------------------------
// Normal
// ---------------------------------------------------------------------------

/// Standard normal CDF Φ(x).
pub fn standard_normal_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Standard normal survival function 1 − Φ(x), accurate in the far tail.
pub fn standard_normal_sf(x: f64) -> f64 {
    Normal::standard().sf(x)
}

/// Standard normal quantile Φ⁻¹(p).
///
/// Returns ∓∞ at the boundaries and `NaN` outside [0, 1].
pub fn inverse_normal_cdf(p: f64) -> f64 {
    match boundary_quantile(p) {
        Some(q) => q,
        None => Normal::standard().inverse_cdf(p),
    }
}

/// Two-sided normal p-value for a z statistic: 2·(1 − Φ(|z|)).
pub fn normal_two_sided_p(z: f64) -> f64 {
    (2.0 * standard_normal_sf(z.abs())).min(1.0)
}

// ---------------------------------------------------------------------------
// Student-t
// ---------------------------------------------------------------------------

/// Student-t CDF with `df` degrees of freedom (`df = ∞` gives Φ).
pub fn t_distribution_cdf(x: f64, df: f64) -> f64 {
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| d.cdf(x))
}

/// Student-t survival function P(T > x).
pub fn t_distribution_sf(x: f64, df: f64) -> f64 {
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| d.sf(x))
}

/// Two-sided t p-value: 2·P(T > |t|).
pub fn t_two_sided_p(t: f64, df: f64) -> f64 {
    (2.0 * t_distribution_sf(t.abs(), df)).min(1.0)
}

/// Student-t quantile.
pub fn t_quantile(p: f64, df: f64) -> f64 {
    if let Some(q) = boundary_quantile(p) {
        return q;
    }
    if df.is_infinite() && df > 0.0 {
        return inverse_normal_cdf(p);
    }
    StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| d.inverse_cdf(p))
}

// ---------------------------------------------------------------------------
// F and chi-squared
// ---------------------------------------------------------------------------

/// F-distribution CDF with (`df1`, `df2`) degrees of freedom.
pub fn f_distribution_cdf(x: f64, df1: f64, df2: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    FisherSnedecor::new(df1, df2).map_or(f64::NAN, |d| d.cdf(x))
}

/// F-distribution upper tail P(F > x).
pub fn f_distribution_sf(x: f64, df1: f64, df2: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    FisherSnedecor::new(df1, df2).map_or(f64::NAN, |d| d.sf(x))
}

/// F-distribution quantile.
pub fn f_quantile(p: f64, df1: f64, df2: f64) -> f64 {
    if p <= 0.0 {
        return if p == 0.0 { 0.0 } else { f64::NAN };
    }
    if p >= 1.0 {
        return if p == 1.0 { f64::INFINITY } else { f64::NAN };
    }
    FisherSnedecor::new(df1, df2).map_or(f64::NAN, |d| d.inverse_cdf(p))
}

/// Chi-squared upper tail P(χ² > x).
pub fn chi_squared_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    ChiSquared::new(df).map_or(f64::NAN, |d| d.sf(x))
}

// ---------------------------------------------------------------------------
// Gamma
// ---------------------------------------------------------------------------

/// Natural log of Γ(x).
pub fn ln_gamma(x: f64) -> f64 {
    statrs::function::gamma::ln_gamma(x)
}

/// Natural log of n!.
pub fn ln_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    ln_gamma(n as f64 + 1.0)
}

// ---------------------------------------------------------------------------
// Studentized range
// ---------------------------------------------------------------------------

// Gauss-Legendre nodes/weights, 12-point rule (positive half).
const XLEG: [f64; 6] = [
    0.981_560_634_246_719_3,
    0.904_117_256_370_474_9,
    0.769_902_674_194_304_7,
    0.587_317_954_286_617_4,
    0.367_831_498_998_180_2,
    0.125_233_408_511_468_9,
];
const ALEG: [f64; 6] = [
    0.047_175_336_386_511_83,
    0.106_939_325_995_318_4,
    0.160_078_328_543_346_2,
    0.203_167_426_723_065_9,
    0.233_492_536_538_354_8,
    0.249_147_045_813_402_8,
];

// Gauss-Legendre nodes/weights, 16-point rule (positive half).
const XLEGQ: [f64; 8] = [
    0.989_400_934_991_649_9,
    0.944_575_023_073_232_6,
    0.865_631_202_387_831_7,
    0.755_404_408_355_003_0,
    0.617_876_244_402_643_7,
    0.458_016_777_657_227_4,
    0.281_603_550_779_258_9,
    0.095_012_509_837_637_44,
];
const ALEGQ: [f64; 8] = [
    0.027_152_459_411_754_09,
    0.062_253_523_938_647_89,
    0.095_158_511_682_492_78,
    0.124_628_971_255_533_9,
    0.149_595_988_816_576_7,
    0.169_156_519_395_002_5,
    0.182_603_415_044_923_6,
    0.189_450_610_455_068_5,
];

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// CDF of the range of `k` independent standard normals, P(W < w).
fn range_of_normals_cdf(w: f64, k: f64) -> f64 {
    let qsqz = w * 0.5;
    if qsqz >= 8.0 {
        return 1.0;
    }

    // (2Φ(w/2) − 1)^k, dropped below ~2e-22
    let mut pr_w = 2.0 * standard_normal_cdf(qsqz) - 1.0;
    pr_w = if pr_w >= (-50.0 / k).exp() {
        pr_w.powf(k)
    } else {
        0.0
    };

    let wincr = if w > 3.0 { 2 } else { 3 };
    let mut blb = qsqz;
    let binc = (8.0 - qsqz) / wincr as f64;
    let mut bub = blb + binc;
    let mut einsum = 0.0;
    let k1 = k - 1.0;

    for _ in 0..wincr {
        let mut elsum = 0.0;
        let a = 0.5 * (bub + blb);
        let b = 0.5 * (bub - blb);

        for jj in 0..12 {
            let (j, xx) = if jj >= 6 {
                (11 - jj, XLEG[11 - jj])
            } else {
                (jj, -XLEG[jj])
            };
            let ac = a + b * xx;
            let qexpo = ac * ac;
            if qexpo > 60.0 {
                break;
            }
            let pplus = standard_normal_cdf(ac);
            let pminus = standard_normal_cdf(ac - w);
            let rinsum = pplus - pminus;
            if rinsum >= (-30.0 / k1).exp() {
                elsum += ALEG[j] * (-0.5 * qexpo).exp() * rinsum.powf(k1);
            }
        }
        elsum *= 2.0 * b * k / SQRT_2PI;
        einsum += elsum;
        blb = bub;
        bub += binc;
    }

    pr_w += einsum;
    if pr_w <= (-30.0_f64).exp() {
        return 0.0;
    }
    pr_w.min(1.0)
}

/// CDF of the Studentized range distribution, P(Q < q), for `k` means and
/// `df` error degrees of freedom (`df = ∞` allowed).
///
/// Returns `NaN` for `k < 2` or `df < 2`.
///
/// # Examples
///
/// ```
/// use u_posthoc::special::{ptukey, qtukey};
///
/// let q = qtukey(0.95, 3.0, 10.0);
/// assert!((ptukey(q, 3.0, 10.0) - 0.95).abs() < 1e-3);
/// ```
pub fn ptukey(q: f64, k: f64, df: f64) -> f64 {
    if q.is_nan() || k.is_nan() || df.is_nan() || k < 2.0 || df < 2.0 {
        return f64::NAN;
    }
    if q <= 0.0 {
        return 0.0;
    }
    if q.is_infinite() {
        return 1.0;
    }
    if df > 25_000.0 {
        return range_of_normals_cdf(q, k);
    }

    let f2 = df * 0.5;
    let mut f2lf = f2 * df.ln() - df * std::f64::consts::LN_2 - ln_gamma(f2);
    let f21 = f2 - 1.0;
    let ff4 = df * 0.25;
    let ulen: f64 = if df <= 100.0 {
        1.0
    } else if df <= 800.0 {
        0.5
    } else if df <= 5000.0 {
        0.25
    } else {
        0.125
    };
    f2lf += ulen.ln();

    let mut ans = 0.0;
    for i in 1..=50 {
        let mut otsum = 0.0;
        let twa1 = (2 * i - 1) as f64 * ulen;

        for jj in 0..16 {
            let (j, u) = if jj >= 8 {
                let j = jj - 8;
                (j, twa1 + XLEGQ[j] * ulen)
            } else {
                (jj, twa1 - XLEGQ[jj] * ulen)
            };
            // log chi density at the node
            let t1 = f2lf + f21 * u.ln() - u * ff4;
            if t1 >= -30.0 {
                let qsqz = q * (u * 0.5).sqrt();
                otsum += range_of_normals_cdf(qsqz, k) * ALEGQ[j] * t1.exp();
            }
        }

        if i as f64 * ulen >= 1.0 && otsum <= 1e-14 {
            break;
        }
        ans += otsum;
    }

    ans.min(1.0)
}

/// Quantile of the Studentized range distribution.
///
/// Secant iteration on [`ptukey`] from the Odeh–Evans starting value,
/// stopping when successive iterates differ by less than 1e-4.
pub fn qtukey(p: f64, k: f64, df: f64) -> f64 {
    if p.is_nan() || k < 2.0 || df < 2.0 || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return 0.0;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let mut x0 = qtukey_start(p, k, df);
    let mut val0 = ptukey(x0, k, df) - p;
    let mut x1 = if val0 > 0.0 { (x0 - 1.0).max(0.0) } else { x0 + 1.0 };
    let mut val1 = ptukey(x1, k, df) - p;

    let mut ans = x1;
    for _ in 1..50 {
        if val1 == val0 {
            break;
        }
        ans = x1 - val1 * (x1 - x0) / (val1 - val0);
        val0 = val1;
        x0 = x1;
        if ans < 0.0 {
            ans = 0.0;
        }
        val1 = ptukey(ans, k, df) - p;
        x1 = ans;
        if (x1 - x0).abs() < 1e-4 {
            return ans;
        }
    }
    ans
}

fn qtukey_start(p: f64, k: f64, df: f64) -> f64 {
    const P0: f64 = 0.322_232_421_088;
    const Q0: f64 = 0.099_348_462_606_0;
    const P1: f64 = -1.0;
    const Q1: f64 = 0.588_581_570_495;
    const P2: f64 = -0.342_242_088_547;
    const Q2: f64 = 0.531_103_462_366;
    const P3: f64 = -0.204_231_210_125;
    const Q3: f64 = 0.103_537_752_850;
    const P4: f64 = -0.453_642_210_148e-4;
    const Q4: f64 = 0.385_607_006_34e-2;
    const VMAX: f64 = 120.0;

    let ps = 0.5 - 0.5 * p;
    let yi = (1.0 / (ps * ps)).ln().sqrt();
    let mut t = yi
        + ((((yi * P4 + P3) * yi + P2) * yi + P1) * yi + P0)
            / ((((yi * Q4 + Q3) * yi + Q2) * yi + Q1) * yi + Q0);
    if df < VMAX {
        t += (t * t * t + t) / df / 4.0;
    }
    let mut q = 0.8832 - 0.2368 * t;
    if df < VMAX {
        q += -1.214 / df + 1.208 * t / df;
    }
    t * (q * (k - 1.0).ln() + 1.4142)
}

fn boundary_quantile(p: f64) -> Option<f64> {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        Some(f64::NAN)
    } else if p == 0.0 {
        Some(f64::NEG_INFINITY)
    } else if p == 1.0 {
        Some(f64::INFINITY)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_quantile_known_values() {
        assert!((inverse_normal_cdf(0.975) - 1.959_963_984_540_054).abs() < 1e-9);
        assert!(inverse_normal_cdf(0.5).abs() < 1e-12);
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert!(inverse_normal_cdf(1.5).is_nan());
    }

    #[test]
    fn normal_two_sided() {
        let p = normal_two_sided_p(1.959_963_984_540_054);
        assert!((p - 0.05).abs() < 1e-9, "p = {p}");
        assert!((normal_two_sided_p(0.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn t_quantile_known_values() {
        // t(0.975, 10) = 2.228139
        assert!((t_quantile(0.975, 10.0) - 2.228_138_85).abs() < 1e-6);
        // infinite df falls back to the normal
        assert!((t_quantile(0.975, f64::INFINITY) - 1.959_964).abs() < 1e-6);
        let p = t_two_sided_p(2.228_138_85, 10.0);
        assert!((p - 0.05).abs() < 1e-6, "p = {p}");
    }

    #[test]
    fn f_quantile_round_trip() {
        let x = f_quantile(0.95, 2.0, 12.0);
        // F(0.95; 2, 12) = 3.885294
        assert!((x - 3.885_294).abs() < 1e-4, "x = {x}");
        assert!((f_distribution_sf(x, 2.0, 12.0) - 0.05).abs() < 1e-6);
        assert_eq!(f_distribution_sf(0.0, 2.0, 12.0), 1.0);
    }

    #[test]
    fn invalid_parameters_yield_nan() {
        assert!(t_distribution_cdf(1.0, f64::NAN).is_nan());
        assert!(f_distribution_sf(1.0, -1.0, 3.0).is_nan());
        assert!(ptukey(3.0, 1.0, 10.0).is_nan());
        assert!(qtukey(0.95, 3.0, 1.0).is_nan());
    }

    #[test]
    fn ln_factorial_small() {
        assert_eq!(ln_factorial(0), 0.0);
        assert_eq!(ln_factorial(1), 0.0);
        assert!((ln_factorial(5) - 120.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn qtukey_two_means_matches_scaled_t() {
        // With two means, q = √2 · t(1 − α/2, df)
        for &df in &[5.0, 10.0, 30.0] {
            let q = qtukey(0.95, 2.0, df);
            let expected = std::f64::consts::SQRT_2 * t_quantile(0.975, df);
            assert!((q - expected).abs() < 2e-3, "df={df}: q={q}, expected={expected}");
        }
    }

    #[test]
    fn qtukey_table_values() {
        // Standard tables of q(0.95; k, df)
        let cases = [(3.0, 10.0, 3.877), (4.0, 20.0, 3.958), (5.0, 60.0, 3.977)];
        for (k, df, expected) in cases {
            let q = qtukey(0.95, k, df);
            assert!((q - expected).abs() < 0.01, "k={k}, df={df}: q={q}");
        }
    }

    #[test]
    fn qtukey_infinite_df() {
        // q(0.95; 2, ∞) = √2 · 1.959964
        let q = qtukey(0.95, 2.0, f64::INFINITY);
        assert!((q - 2.771_808).abs() < 2e-3, "q = {q}");
        // q(0.95; 3, ∞) = 3.314
        let q3 = qtukey(0.95, 3.0, f64::INFINITY);
        assert!((q3 - 3.314).abs() < 0.01, "q = {q3}");
    }

    #[test]
    fn ptukey_monotone_and_bounded() {
        let mut prev = 0.0;
        for i in 1..40 {
            let q = i as f64 * 0.25;
            let p = ptukey(q, 4.0, 15.0);
            assert!((0.0..=1.0).contains(&p), "p = {p}");
            assert!(p >= prev - 1e-12, "not monotone at q={q}");
            prev = p;
        }
        assert_eq!(ptukey(0.0, 4.0, 15.0), 0.0);
        assert_eq!(ptukey(f64::INFINITY, 4.0, 15.0), 1.0);
    }

    #[test]
    fn ptukey_across_integration_step_sizes() {
        // each df falls in a different quadrature interval length
        let limit = ptukey(3.314, 3.0, f64::INFINITY);
        let mut prev = 0.0;
        for df in [50.0, 500.0, 2_000.0, 10_000.0] {
            let p = ptukey(3.314, 3.0, df);
            assert!(p > 0.93 && p < 0.951, "df={df}: p={p}");
            assert!(p >= prev - 1e-6, "df={df}: p={p} < {prev}");
            prev = p;
        }
        assert!((prev - limit).abs() < 1e-3, "{prev} vs {limit}");
    }
}
