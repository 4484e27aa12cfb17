//! Mean-based post-hoc comparisons.
//!
//! All methods except Tamhane T2 share the pooled within-group variance
//! `mse = Σ(nᵢ−1)vᵢ / (N−k)` and its `N−k` degrees of freedom. They differ
//! in how the critical value and the reported p-value account for the
//! number of comparisons.
//!
//! | Method      | Critical value                      | Adjusted p        |
//! |-------------|-------------------------------------|-------------------|
//! | LSD         | t(1−α/2, df)                        | raw               |
//! | Bonferroni  | t(1−α/2m, df)                       | min(1, m·p)       |
//! | Šidák       | t(1−α′/2, df), α′ = 1−(1−α)^(1/m)    | 1−(1−p)^m         |
//! | Scheffé     | √((k−1)·F(1−α; k−1, df))            | F tail at t²/(k−1) |
//! | Tukey HSD   | q(1−α; k, df) / √2                  | 1−P_q(√2·t)       |
//! | Tamhane T2  | Welch t, Šidák-adjusted α           | 1−(1−p)^m         |
//!
//! SNK and Duncan are stepwise and live in a sibling module.

use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use super::cld::compact_letter_display;
use super::options::PostHocOptions;
use super::resolve_pairs;
use super::result::{PairwiseComparison, PostHocMethod, PostHocResult};
use super::stepwise::{self, StepwiseRule};
use crate::error::{check_alpha, PostHocError, Result};
use crate::special;
use crate::summary::{self, GroupSummary};
use crate::testing;

/// Parametric post-hoc method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParametricMethod {
    /// Fisher's least significant difference (no correction).
    Lsd,
    /// t-tests with Bonferroni correction.
    Bonferroni,
    /// t-tests with Šidák correction.
    Sidak,
    /// Scheffé's method.
    Scheffe,
    /// Tukey–Kramer honestly significant difference.
    Tukey,
    /// Tamhane's T2 for unequal variances.
    TamhaneT2,
    /// Student–Newman–Keuls multiple range test.
    Snk,
    /// Duncan's new multiple range test.
    Duncan,
}

impl ParametricMethod {
    const ALLOWED: &'static str = "lsd, bonferroni, sidak, scheffe, tukey, tamhane, snk, duncan";

    /// The symbol this method is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParametricMethod::Lsd => "lsd",
            ParametricMethod::Bonferroni => "bonferroni",
            ParametricMethod::Sidak => "sidak",
            ParametricMethod::Scheffe => "scheffe",
            ParametricMethod::Tukey => "tukey",
            ParametricMethod::TamhaneT2 => "tamhane",
            ParametricMethod::Snk => "snk",
            ParametricMethod::Duncan => "duncan",
        }
    }
}

impl fmt::Display for ParametricMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParametricMethod::Lsd => "Fisher LSD",
            ParametricMethod::Bonferroni => "Bonferroni",
            ParametricMethod::Sidak => "Sidak",
            ParametricMethod::Scheffe => "Scheffe",
            ParametricMethod::Tukey => "Tukey HSD",
            ParametricMethod::TamhaneT2 => "Tamhane T2",
            ParametricMethod::Snk => "Student-Newman-Keuls",
            ParametricMethod::Duncan => "Duncan",
        };
        f.write_str(name)
    }
}

impl FromStr for ParametricMethod {
    type Err = PostHocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lsd" => Ok(ParametricMethod::Lsd),
            "bonferroni" => Ok(ParametricMethod::Bonferroni),
            "sidak" => Ok(ParametricMethod::Sidak),
            "scheffe" => Ok(ParametricMethod::Scheffe),
            "tukey" | "hsd" => Ok(ParametricMethod::Tukey),
            "tamhane" | "tamhane_t2" => Ok(ParametricMethod::TamhaneT2),
            "snk" => Ok(ParametricMethod::Snk),
            "duncan" => Ok(ParametricMethod::Duncan),
            _ => Err(PostHocError::UnsupportedMethod {
                kind: "parametric",
                name: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Pairwise comparison of group means.
///
/// `labels` name the groups in the exports; `None` yields `G1..Gk`.
///
/// Before comparing, a Brown–Forsythe Levene test checks the equal-variance
/// assumption. A p-value below `options.alpha_levene` adds a warning that
/// recommends Tamhane T2; it never stops the analysis. Tamhane T2 itself
/// skips the check.
///
/// # Errors
///
/// - [`PostHocError::InsufficientGroups`] for fewer than two groups.
/// - [`PostHocError::InvalidAlpha`] when `alpha` or `alpha_levene` is
///   outside (0, 1).
/// - [`PostHocError::InvalidInput`] for empty groups, non-finite values,
///   bad pairs, or a pooled variance of zero. Tukey, SNK and Duncan also
///   need at least two residual degrees of freedom.
/// - [`PostHocError::DegenerateGroup`] for Tamhane T2 on a group with fewer
///   than two observations or zero variance.
/// - [`PostHocError::ShapeMismatch`] when the label count differs from the
///   group count.
///
/// # References
///
/// - Tukey (1953), Kramer (1956). Honestly significant difference.
/// - Scheffé (1953). "A method for judging all contrasts in the analysis
///   of variance". Biometrika, 40, 87–104.
/// - Tamhane (1979). "A comparison of procedures for multiple comparisons
///   of means with unequal variances". JASA, 74, 471–480.
pub fn parametric_posthoc(
    groups: &[&[f64]],
    labels: Option<&[&str]>,
    method: ParametricMethod,
    options: &PostHocOptions,
) -> Result<PostHocResult> {
    let summaries = summary::summarize_groups(groups, "parametric post-hoc")?;
    check_alpha(options.alpha)?;
    check_alpha(options.alpha_levene)?;
    let k = summaries.len();
    let labels = summary::resolve_labels(labels, k, "G")?;
    let pairs = resolve_pairs(options.pairs.as_deref(), k)?;

    let mut warnings = Vec::new();
    if method != ParametricMethod::TamhaneT2 {
        if let Some(levene) = testing::levene_test(groups) {
            if levene.p_value < options.alpha_levene {
                let msg = format!(
                    "Levene's test rejects equal variances (p = {:.4} < {}); consider Tamhane T2",
                    levene.p_value, options.alpha_levene
                );
                warn!(p_value = levene.p_value, method = %method, "{msg}");
                warnings.push(msg);
            }
        }
    }

    let comparisons = match method {
        ParametricMethod::TamhaneT2 => tamhane(&summaries, &pairs, options.alpha)?,
        _ => {
            let (mse, df) = summary::pooled_mse(&summaries)?;
            if mse.is_nan() || mse <= 0.0 {
                return Err(PostHocError::InvalidInput(
                    "pooled variance is zero; all groups are constant".to_string(),
                ));
            }
            let range_based = matches!(
                method,
                ParametricMethod::Tukey | ParametricMethod::Snk | ParametricMethod::Duncan
            );
            if range_based && df < 2.0 {
                return Err(PostHocError::InvalidInput(format!(
                    "{method} needs at least 2 residual degrees of freedom, got {df}"
                )));
            }
            match method {
                ParametricMethod::Snk => stepwise::multiple_range(
                    &summaries,
                    mse,
                    df,
                    &pairs,
                    StepwiseRule::Snk,
                    options.alpha,
                ),
                ParametricMethod::Duncan => stepwise::multiple_range(
                    &summaries,
                    mse,
                    df,
                    &pairs,
                    StepwiseRule::Duncan,
                    options.alpha,
                ),
                _ => pooled(&summaries, mse, df, &pairs, method, options.alpha),
            }
        }
    };

    let cld = if options.cld {
        let means: Vec<f64> = summaries.iter().map(|s| s.mean).collect();
        let letters = compact_letter_display(&means, &comparisons, options.alpha)?;
        warnings.extend(letters.warnings);
        Some(letters.letters)
    } else {
        None
    };

    Ok(PostHocResult {
        method: PostHocMethod::Parametric(method),
        comparisons,
        alpha: options.alpha,
        cld,
        labels,
        warnings,
    })
}

/// `1 − (1 − p)^m`, computed without cancellation for small `p`.
pub(crate) fn sidak_adjust(p: f64, m: f64) -> f64 {
    (-(m * (-p).ln_1p()).exp_m1()).clamp(0.0, 1.0)
}

/// Per-comparison level `1 − (1 − α)^(1/m)`.
pub(crate) fn sidak_alpha(alpha: f64, m: f64) -> f64 {
    -((-alpha).ln_1p() / m).exp_m1()
}

fn pooled(
    summaries: &[GroupSummary],
    mse: f64,
    df: f64,
    pairs: &[(usize, usize)],
    method: ParametricMethod,
    alpha: f64,
) -> Vec<PairwiseComparison> {
    let k = summaries.len() as f64;
    let m = pairs.len() as f64;

    let critical = match method {
        ParametricMethod::Lsd => special::t_quantile(1.0 - alpha / 2.0, df),
        ParametricMethod::Bonferroni => special::t_quantile(1.0 - alpha / (2.0 * m), df),
        ParametricMethod::Sidak => special::t_quantile(1.0 - sidak_alpha(alpha, m) / 2.0, df),
        ParametricMethod::Scheffe => ((k - 1.0) * special::f_quantile(1.0 - alpha, k - 1.0, df)).sqrt(),
        _ => special::qtukey(1.0 - alpha, k, df) / SQRT_2,
    };

    pairs
        .iter()
        .map(|&(i, j)| {
            let (a, b) = (&summaries[i], &summaries[j]);
            let diff = a.mean - b.mean;
            let se = (mse * (1.0 / a.n as f64 + 1.0 / b.n as f64)).sqrt();
            let t = diff / se;

            let (p_value, adjusted) = match method {
                ParametricMethod::Lsd => {
                    let p = special::t_two_sided_p(t, df);
                    (p, p)
                }
                ParametricMethod::Bonferroni => {
                    let p = special::t_two_sided_p(t, df);
                    (p, (p * m).min(1.0))
                }
                ParametricMethod::Sidak => {
                    let p = special::t_two_sided_p(t, df);
                    (p, sidak_adjust(p, m))
                }
                ParametricMethod::Scheffe => {
                    let p = special::f_distribution_sf(t * t / (k - 1.0), k - 1.0, df);
                    (p, p)
                }
                _ => {
                    let p = (1.0 - special::ptukey(t.abs() * SQRT_2, k, df)).clamp(0.0, 1.0);
                    (p, p)
                }
            };

            PairwiseComparison {
                group1: i,
                group2: j,
                diff,
                std_error: se,
                statistic: t,
                critical,
                p_value,
                adjusted_p_value: adjusted,
                ci_lower: diff - critical * se,
                ci_upper: diff + critical * se,
                rejected: adjusted < alpha,
                note: String::new(),
            }
        })
        .collect()
}

fn tamhane(
    summaries: &[GroupSummary],
    pairs: &[(usize, usize)],
    alpha: f64,
) -> Result<Vec<PairwiseComparison>> {
    for (index, s) in summaries.iter().enumerate() {
        if s.n < 2 {
            return Err(PostHocError::DegenerateGroup {
                index,
                reason: "fewer than two observations",
            });
        }
        if s.variance.is_nan() || s.variance <= 0.0 {
            return Err(PostHocError::DegenerateGroup {
                index,
                reason: "zero variance",
            });
        }
    }

    let m = pairs.len() as f64;
    let alpha_pc = sidak_alpha(alpha, m);
    Ok(pairs
        .iter()
        .map(|&(i, j)| {
            let (a, b) = (&summaries[i], &summaries[j]);
            let qa = a.variance / a.n as f64;
            let qb = b.variance / b.n as f64;
            let se = (qa + qb).sqrt();
            let df = (qa + qb).powi(2)
                / (qa * qa / (a.n as f64 - 1.0) + qb * qb / (b.n as f64 - 1.0));
            let diff = a.mean - b.mean;
            let t = diff / se;
            let p = special::t_two_sided_p(t, df);
            let adjusted = sidak_adjust(p, m);
            let critical = special::t_quantile(1.0 - alpha_pc / 2.0, df);

            PairwiseComparison {
                group1: i,
                group2: j,
                diff,
                std_error: se,
                statistic: t,
                critical,
                p_value: p,
                adjusted_p_value: adjusted,
                ci_lower: diff - critical * se,
                ci_upper: diff + critical * se,
                rejected: adjusted < alpha,
                note: format!("df = {df:.2}"),
            }
        })
        .collect())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn adjusted_p_bounded(
            g1 in proptest::collection::vec(-50.0_f64..50.0, 3..10),
            g2 in proptest::collection::vec(-50.0_f64..50.0, 3..10),
            g3 in proptest::collection::vec(-50.0_f64..50.0, 3..10),
        ) {
            for method in [
                ParametricMethod::Lsd,
                ParametricMethod::Bonferroni,
                ParametricMethod::Sidak,
                ParametricMethod::Scheffe,
                ParametricMethod::Tukey,
            ] {
                let r = parametric_posthoc(&[&g1, &g2, &g3], None, method, &PostHocOptions::default())
                    .expect("random groups have spread");
                for c in &r.comparisons {
                    prop_assert!((0.0..=1.0).contains(&c.p_value), "{} p = {}", method, c.p_value);
                    prop_assert!(c.adjusted_p_value >= c.p_value - 1e-12);
                }
            }
        }
    }
}
