//! Omnibus hypothesis tests.
//!
//! Welch's heteroscedasticity-robust ANOVA, the classic one-way ANOVA and
//! the Levene (Brown–Forsythe) variance test used as a post-hoc pre-check,
//! plus the exact 2×2 Fisher test and the chi-squared test of independence
//! that the contingency engines build on.
//!
//! # Examples
//!
//! ```
//! use u_posthoc::testing::welch_anova;
//!
//! let g1 = [5.0, 6.0, 7.0, 5.5, 6.5];
//! let g2 = [8.0, 9.0, 8.5, 9.5, 8.0];
//! let g3 = [4.0, 3.0, 3.5, 4.5, 4.0];
//! let r = welch_anova(&[&g1, &g2, &g3]).unwrap();
//! assert!(r.p_value < 0.01);
//! ```

use crate::error::{PostHocError, Result};
use crate::special;
use crate::summary::{self, GroupSummary};

/// Result of a hypothesis test.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestResult {
    /// Test statistic (F, χ², or z depending on test).
    pub statistic: f64,
    /// Degrees of freedom.
    pub df: f64,
    /// p-value.
    pub p_value: f64,
}

// ---------------------------------------------------------------------------
// Welch ANOVA
// ---------------------------------------------------------------------------

/// Result of Welch's one-way ANOVA.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WelchAnovaResult {
    /// Welch F-statistic.
    pub f_statistic: f64,
    /// Numerator degrees of freedom, k − 1.
    pub df1: f64,
    /// Denominator degrees of freedom, (k² − 1) / (3Λ).
    pub df2: f64,
    /// Upper-tail p-value of F(df1, df2).
    pub p_value: f64,
    /// Per-group size, mean and variance.
    pub groups: Vec<GroupSummary>,
    /// Precision weights wᵢ = nᵢ / vᵢ.
    pub weights: Vec<f64>,
    /// Weighted grand mean m' = Σwᵢmᵢ / W.
    pub weighted_mean: f64,
}

/// Welch's ANOVA: H₀: all group means are equal, variances may differ.
///
/// # Algorithm
///
/// ```text
/// wᵢ = nᵢ / vᵢ,  W = Σwᵢ,  m' = Σwᵢmᵢ / W
/// Λ  = Σ (1 − wᵢ/W)² / (nᵢ − 1)
/// F  = [Σwᵢ(mᵢ − m')² / (k − 1)] / [1 + 2(k − 2)Λ / (k² − 1)]
/// df1 = k − 1,  df2 = (k² − 1) / (3Λ)
/// ```
///
/// # Errors
///
/// - [`PostHocError::InsufficientGroups`] with fewer than 2 groups.
/// - [`PostHocError::DegenerateGroup`] when a group has fewer than 2
///   observations or zero variance (the weights would be undefined).
/// - [`PostHocError::InvalidInput`] on empty groups or non-finite values.
///
/// # References
///
/// Welch (1951). "On the comparison of several mean values: an alternative
/// approach". Biometrika, 38, 330–336.
pub fn welch_anova(groups: &[&[f64]]) -> Result<WelchAnovaResult> {
    let summaries = summary::summarize_groups(groups, "Welch ANOVA")?;
    for (index, s) in summaries.iter().enumerate() {
        if s.n < 2 {
            return Err(PostHocError::DegenerateGroup {
                index,
                reason: "fewer than 2 observations",
            });
        }
        if s.variance <= 0.0 {
            return Err(PostHocError::DegenerateGroup {
                index,
                reason: "zero variance",
            });
        }
    }

    let k = summaries.len() as f64;
    let weights: Vec<f64> = summaries.iter().map(|s| s.n as f64 / s.variance).collect();
    let w_total: f64 = weights.iter().sum();
    let weighted_mean = summaries
        .iter()
        .zip(&weights)
        .map(|(s, w)| w * s.mean)
        .sum::<f64>()
        / w_total;

    let numerator = summaries
        .iter()
        .zip(&weights)
        .map(|(s, w)| w * (s.mean - weighted_mean).powi(2))
        .sum::<f64>()
        / (k - 1.0);

    let lambda: f64 = summaries
        .iter()
        .zip(&weights)
        .map(|(s, w)| (1.0 - w / w_total).powi(2) / (s.n as f64 - 1.0))
        .sum();

    let correction = 1.0 + 2.0 * (k - 2.0) / (k * k - 1.0) * lambda;
    let f_statistic = numerator / correction;
    let df1 = k - 1.0;
    let df2 = (k * k - 1.0) / (3.0 * lambda);
    let p_value = special::f_distribution_sf(f_statistic, df1, df2);

    Ok(WelchAnovaResult {
        f_statistic,
        df1,
        df2,
        p_value,
        groups: summaries,
        weights,
        weighted_mean,
    })
}

// ---------------------------------------------------------------------------
// Classic ANOVA
// ---------------------------------------------------------------------------

/// Result of one-way ANOVA.
#[derive(Debug, Clone)]
pub struct AnovaResult {
    /// F-statistic.
    pub f_statistic: f64,
    /// Degrees of freedom between groups.
    pub df_between: usize,
    /// Degrees of freedom within groups.
    pub df_within: usize,
    /// p-value.
    pub p_value: f64,
    /// Mean square within (pooled error variance).
    pub ms_within: f64,
}

/// One-way ANOVA: H₀: all group means are equal (equal variances assumed).
///
/// # Returns
///
/// `None` if fewer than 2 groups, any group is empty, no residual degrees
/// of freedom remain, or values are non-finite.
pub fn one_way_anova(groups: &[&[f64]]) -> Option<AnovaResult> {
    let k = groups.len();
    if k < 2 {
        return None;
    }
    for g in groups {
        if g.is_empty() || g.iter().any(|v| !v.is_finite()) {
            return None;
        }
    }

    let total_n: usize = groups.iter().map(|g| g.len()).sum();
    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / total_n as f64;

    let group_means: Vec<f64> = groups
        .iter()
        .map(|g| g.iter().sum::<f64>() / g.len() as f64)
        .collect();

    let ss_between: f64 = groups
        .iter()
        .zip(group_means.iter())
        .map(|(g, &gm)| g.len() as f64 * (gm - grand_mean).powi(2))
        .sum();

    let ss_within: f64 = groups
        .iter()
        .zip(group_means.iter())
        .map(|(g, &gm)| g.iter().map(|&x| (x - gm).powi(2)).sum::<f64>())
        .sum();

    let df_between = k - 1;
    let df_within = total_n - k;
    if df_within == 0 {
        return None;
    }

    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    let f_statistic = if ms_within > 1e-300 {
        ms_between / ms_within
    } else {
        f64::INFINITY
    };

    let p_value = if f_statistic.is_infinite() {
        0.0
    } else {
        special::f_distribution_sf(f_statistic, df_between as f64, df_within as f64)
    };

    Some(AnovaResult {
        f_statistic,
        df_between,
        df_within,
        p_value,
        ms_within,
    })
}

/// Levene test for equality of variances, Brown–Forsythe (median) variant.
///
/// Applies one-way ANOVA to zᵢⱼ = |xᵢⱼ − median(groupᵢ)|.
///
/// # Returns
///
/// `None` under the same conditions as [`one_way_anova`].
///
/// # References
///
/// Brown & Forsythe (1974). "Robust tests for the equality of variances".
/// JASA, 69(346), 364–367.
pub fn levene_test(groups: &[&[f64]]) -> Option<TestResult> {
    if groups.len() < 2 {
        return None;
    }
    let z_groups: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let m = summary::median(g);
            g.iter().map(|&x| (x - m).abs()).collect()
        })
        .collect();

    let z_refs: Vec<&[f64]> = z_groups.iter().map(|v| v.as_slice()).collect();
    let anova = one_way_anova(&z_refs)?;

    Some(TestResult {
        statistic: anova.f_statistic,
        df: anova.df_between as f64,
        p_value: anova.p_value,
    })
}

// ---------------------------------------------------------------------------
// Fisher exact test (2×2)
// ---------------------------------------------------------------------------

/// Result of the exact 2×2 Fisher test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FisherExact {
    /// Sample odds ratio (a·d)/(b·c); `∞` when b or c is zero.
    pub odds_ratio: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

/// Fisher exact test for a 2×2 table:
///
/// ```text
///          Col1   Col2
///   Row1 |  a   |  b  |
///   Row2 |  c   |  d  |
/// ```
///
/// # Algorithm
///
/// Enumerates every table with the observed margins and sums the
/// hypergeometric probabilities that do not exceed P(observed) (with a
/// 1e-10 log tolerance). A table with a zero margin admits a single
/// arrangement and so has p = 1.
///
/// # Examples
///
/// ```
/// use u_posthoc::testing::fisher_exact_2x2;
///
/// let r = fisher_exact_2x2(3, 1, 1, 3);
/// assert!((r.p_value - 0.4857142857).abs() < 1e-8);
/// ```
pub fn fisher_exact_2x2(a: u64, b: u64, c: u64, d: u64) -> FisherExact {
    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let col2 = b + d;
    let n = row1 + row2;

    let log_prob = |a_i: u64| -> f64 {
        let b_i = row1 - a_i;
        let c_i = col1 - a_i;
        let d_i = row2 - c_i;
        special::ln_factorial(row1)
            + special::ln_factorial(row2)
            + special::ln_factorial(col1)
            + special::ln_factorial(col2)
            - special::ln_factorial(a_i)
            - special::ln_factorial(b_i)
            - special::ln_factorial(c_i)
            - special::ln_factorial(d_i)
            - special::ln_factorial(n)
    };

    let a_min = col1.saturating_sub(row2);
    let a_max = row1.min(col1);
    let log_p_obs = log_prob(a);

    let mut p_value = 0.0;
    for a_i in a_min..=a_max {
        let lp = log_prob(a_i);
        if lp <= log_p_obs + 1e-10 {
            p_value += lp.exp();
        }
    }

    let odds_ratio = if b > 0 && c > 0 {
        (a as f64 * d as f64) / (b as f64 * c as f64)
    } else {
        f64::INFINITY
    };

    FisherExact {
        odds_ratio,
        p_value: p_value.min(1.0),
    }
}

// ---------------------------------------------------------------------------
// Chi-squared test of independence
// ---------------------------------------------------------------------------

/// Chi-squared test of independence on a flat row-major table.
///
/// # Algorithm
///
/// Eᵢⱼ = (row_sumᵢ × col_sumⱼ) / N, χ² = Σ (Oᵢⱼ − Eᵢⱼ)² / Eᵢⱼ,
/// df = (r − 1)(c − 1).
///
/// # Returns
///
/// `None` if fewer than 2 rows or columns, the slice length disagrees with
/// the shape, or any marginal is zero.
pub fn chi_squared_independence(table: &[u64], n_rows: usize, n_cols: usize) -> Option<TestResult> {
    if n_rows < 2 || n_cols < 2 || table.len() != n_rows * n_cols {
        return None;
    }

    let mut row_sums = vec![0.0; n_rows];
    let mut col_sums = vec![0.0; n_cols];
    let mut total = 0.0;
    for i in 0..n_rows {
        for j in 0..n_cols {
            let val = table[i * n_cols + j] as f64;
            row_sums[i] += val;
            col_sums[j] += val;
            total += val;
        }
    }

    if row_sums.iter().chain(col_sums.iter()).any(|&m| m <= 0.0) {
        return None;
    }

    let mut chi2 = 0.0;
    for i in 0..n_rows {
        for j in 0..n_cols {
            let observed = table[i * n_cols + j] as f64;
            let expected = row_sums[i] * col_sums[j] / total;
            chi2 += (observed - expected).powi(2) / expected;
        }
    }

    let df = ((n_rows - 1) * (n_cols - 1)) as f64;
    Some(TestResult {
        statistic: chi2,
        df,
        p_value: special::chi_squared_sf(chi2, df),
    })
}
