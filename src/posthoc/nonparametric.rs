//! Rank-based post-hoc comparisons (Dunn, Nemenyi).
//!
//! Observations from all groups are pooled and ranked with mid-ranks for
//! ties. Comparisons work on the difference of mean ranks.

use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use super::cld::compact_letter_display;
use super::options::PostHocOptions;
use super::parametric::{sidak_adjust, sidak_alpha};
use super::resolve_pairs;
use super::result::{PairwiseComparison, PostHocMethod, PostHocResult};
use crate::error::{check_alpha, PostHocError, Result};
use crate::special;
use crate::summary;

/// Non-parametric post-hoc method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NonParametricMethod {
    /// Dunn's z-test, unadjusted.
    Dunn,
    /// Dunn's z-test with Bonferroni correction.
    DunnBonferroni,
    /// Dunn's z-test with Šidák correction.
    DunnSidak,
    /// Nemenyi test (Studentized range with infinite df).
    Nemenyi,
}

impl NonParametricMethod {
    const ALLOWED: &'static str = "dunn, dunn_bonferroni, dunn_sidak, nemenyi";

    /// The symbol this method is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            NonParametricMethod::Dunn => "dunn",
            NonParametricMethod::DunnBonferroni => "dunn_bonferroni",
            NonParametricMethod::DunnSidak => "dunn_sidak",
            NonParametricMethod::Nemenyi => "nemenyi",
        }
    }
}

impl fmt::Display for NonParametricMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NonParametricMethod::Dunn => "Dunn",
            NonParametricMethod::DunnBonferroni => "Dunn (Bonferroni)",
            NonParametricMethod::DunnSidak => "Dunn (Sidak)",
            NonParametricMethod::Nemenyi => "Nemenyi",
        };
        f.write_str(name)
    }
}

impl FromStr for NonParametricMethod {
    type Err = PostHocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dunn" => Ok(NonParametricMethod::Dunn),
            "dunn_bonferroni" => Ok(NonParametricMethod::DunnBonferroni),
            "dunn_sidak" => Ok(NonParametricMethod::DunnSidak),
            "nemenyi" => Ok(NonParametricMethod::Nemenyi),
            _ => Err(PostHocError::UnsupportedMethod {
                kind: "non-parametric",
                name: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Pooled ranking of all groups.
#[derive(Debug, Clone)]
struct RankSummary {
    mean_ranks: Vec<f64>,
    sizes: Vec<usize>,
    /// `N(N+1)/12 · tie correction`.
    base_variance: f64,
}

fn rank_groups(groups: &[&[f64]]) -> RankSummary {
    let mut pooled: Vec<(f64, usize)> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, data)| data.iter().map(move |&x| (x, g)))
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    let ranks = average_ranks(&pooled);
    let n = pooled.len() as f64;
    let mut correction = 1.0 - compute_tie_correction(&pooled) / (n * n * n - n);
    if correction == 0.0 {
        correction = 1.0;
    }

    let k = groups.len();
    let mut rank_sums = vec![0.0; k];
    for (&(_, g), r) in pooled.iter().zip(&ranks) {
        rank_sums[g] += r;
    }
    let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    let mean_ranks = rank_sums
        .iter()
        .zip(&sizes)
        .map(|(s, &n)| s / n as f64)
        .collect();

    RankSummary {
        mean_ranks,
        sizes,
        base_variance: n * (n + 1.0) / 12.0 * correction,
    }
}

// Average ranks of sorted (value, group) pairs; tied values share the mean
// of their positions.
fn average_ranks(sorted: &[(f64, usize)]) -> Vec<f64> {
    let n = sorted.len();
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for rank in ranks.iter_mut().take(j).skip(i) {
            *rank = avg_rank;
        }
        i = j;
    }
    ranks
}

// Σ (t³ − t) over tie blocks of size t > 1.
fn compute_tie_correction(sorted: &[(f64, usize)]) -> f64 {
    let n = sorted.len();
    let mut correction = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && sorted[j].0 == sorted[i].0 {
            j += 1;
        }
        let t = (j - i) as f64;
        if t > 1.0 {
            correction += t * t * t - t;
        }
        i = j;
    }
    correction
}

/// Pairwise comparison of mean ranks after a Kruskal–Wallis test.
///
/// # Algorithm
///
/// With `N` pooled observations and tie factor `C = 1 − Σ(t³−t)/(N³−N)`
/// (taken as 1 when it evaluates to 0):
///
/// ```text
/// se = √(N(N+1)/12 · C · (1/nᵢ + 1/nⱼ)),   z = (R̄ᵢ − R̄ⱼ) / se
/// ```
///
/// Dunn reports the two-sided normal p-value, optionally Bonferroni or
/// Šidák adjusted. Nemenyi compares `|z|` with `q(1−α; k, ∞)/√2` and
/// reports `1 − P_q(√2·|z|; k, ∞)`.
///
/// `options.alpha_levene` is ignored.
///
/// # Errors
///
/// Same configuration and input errors as
/// [`parametric_posthoc`](super::parametric_posthoc).
///
/// # References
///
/// - Dunn (1964). "Multiple comparisons using rank sums".
///   Technometrics, 6(3), 241–252.
/// - Nemenyi (1963). Distribution-free multiple comparisons. PhD thesis,
///   Princeton University.
///
/// # Examples
///
/// ```
/// use u_posthoc::posthoc::{nonparametric_posthoc, NonParametricMethod, PostHocOptions};
///
/// let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let b = [11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
/// let r = nonparametric_posthoc(&[&a, &b], None, NonParametricMethod::Dunn,
///     &PostHocOptions::default()).unwrap();
/// assert!(r.comparisons[0].rejected);
/// ```
pub fn nonparametric_posthoc(
    groups: &[&[f64]],
    labels: Option<&[&str]>,
    method: NonParametricMethod,
    options: &PostHocOptions,
) -> Result<PostHocResult> {
    summary::summarize_groups(groups, "non-parametric post-hoc")?;
    check_alpha(options.alpha)?;
    let k = groups.len();
    let labels = summary::resolve_labels(labels, k, "G")?;
    let pairs = resolve_pairs(options.pairs.as_deref(), k)?;

    let ranks = rank_groups(groups);
    let m = pairs.len() as f64;
    let alpha = options.alpha;
    let critical = match method {
        NonParametricMethod::Dunn => special::inverse_normal_cdf(1.0 - alpha / 2.0),
        NonParametricMethod::DunnBonferroni => {
            special::inverse_normal_cdf(1.0 - alpha / (2.0 * m))
        }
        NonParametricMethod::DunnSidak => {
            special::inverse_normal_cdf(1.0 - sidak_alpha(alpha, m) / 2.0)
        }
        NonParametricMethod::Nemenyi => {
            special::qtukey(1.0 - alpha, k as f64, f64::INFINITY) / SQRT_2
        }
    };

    let comparisons: Vec<PairwiseComparison> = pairs
        .iter()
        .map(|&(i, j)| {
            let diff = ranks.mean_ranks[i] - ranks.mean_ranks[j];
            let se = (ranks.base_variance
                * (1.0 / ranks.sizes[i] as f64 + 1.0 / ranks.sizes[j] as f64))
                .sqrt();
            let z = diff / se;
            let (p_value, adjusted) = match method {
                NonParametricMethod::Nemenyi => {
                    let p = (1.0 - special::ptukey(z.abs() * SQRT_2, k as f64, f64::INFINITY))
                        .clamp(0.0, 1.0);
                    (p, p)
                }
                _ => {
                    let p = special::normal_two_sided_p(z);
                    let adj = match method {
                        NonParametricMethod::DunnBonferroni => (p * m).min(1.0),
                        NonParametricMethod::DunnSidak => sidak_adjust(p, m),
                        _ => p,
                    };
                    (p, adj)
                }
            };
            PairwiseComparison {
                group1: i,
                group2: j,
                diff,
                std_error: se,
                statistic: z,
                critical,
                p_value,
                adjusted_p_value: adjusted,
                ci_lower: diff - critical * se,
                ci_upper: diff + critical * se,
                rejected: adjusted < alpha,
                note: String::new(),
            }
        })
        .collect();

    let mut warnings = Vec::new();
    let cld = if options.cld {
        let letters = compact_letter_display(&ranks.mean_ranks, &comparisons, alpha)?;
        warnings.extend(letters.warnings);
        Some(letters.letters)
    } else {
        None
    };

    Ok(PostHocResult {
        method: PostHocMethod::NonParametric(method),
        comparisons,
        alpha,
        cld,
        labels,
        warnings,
    })
}
