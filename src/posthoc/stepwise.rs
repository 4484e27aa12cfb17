//! Stepwise multiple range tests (Student–Newman–Keuls and Duncan).
//!
//! # Algorithm
//!
//! Means are sorted ascending. For span `p` from `k` down to 2, every run
//! of `p` consecutive sorted means is tested with
//!
//! ```text
//! q = (max − min) / √(mse / n_h)        n_h = k / Σ(1/nᵢ)
//! ```
//!
//! against `q(1 − α_p; p, df)`, where `α_p = α` for SNK and
//! `α_p = 1 − (1 − α)^(p−1)` for Duncan. A run is significant only if its
//! own test passes and both enclosing runs of span `p + 1` that share one
//! of its endpoints were significant. Once a range is declared
//! non-significant, everything nested inside it is too.
//!
//! # References
//!
//! - Keuls (1952). "The use of the Studentized range in connection with an
//!   analysis of variance". Euphytica, 1, 112–122.
//! - Duncan (1955). "Multiple range and multiple F tests". Biometrics,
//!   11(1), 1–42.

use tracing::debug;

use super::result::PairwiseComparison;
use crate::special;
use crate::summary::GroupSummary;

/// Span-dependent significance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepwiseRule {
    /// Same α at every span.
    Snk,
    /// Protection level α_p = 1 − (1 − α)^(p−1).
    Duncan,
}

impl StepwiseRule {
    fn span_alpha(self, alpha: f64, span: usize) -> f64 {
        match self {
            StepwiseRule::Snk => alpha,
            StepwiseRule::Duncan => 1.0 - (1.0 - alpha).powi(span as i32 - 1),
        }
    }

    /// Rescales a span-`p` tail probability to the family level so that
    /// `adjusted < α ⇔ raw < α_p`.
    fn family_p(self, raw: f64, span: usize) -> f64 {
        match self {
            StepwiseRule::Snk => raw,
            StepwiseRule::Duncan => {
                (1.0 - (1.0 - raw).powf(1.0 / (span as f64 - 1.0))).clamp(0.0, 1.0)
            }
        }
    }
}

struct RangeTest {
    q: f64,
    critical: f64,
    p_value: f64,
    adjusted: f64,
    significant: bool,
    protected: bool,
}

/// Runs the step-down procedure over all ranges, then reports the
/// requested pairs in `(group1, group2)` order.
pub(crate) fn multiple_range(
    summaries: &[GroupSummary],
    mse: f64,
    df: f64,
    pairs: &[(usize, usize)],
    rule: StepwiseRule,
    alpha: f64,
) -> Vec<PairwiseComparison> {
    let k = summaries.len();
    let n_h = k as f64 / summaries.iter().map(|s| 1.0 / s.n as f64).sum::<f64>();
    let se = (mse / n_h).sqrt();

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| summaries[a].mean.total_cmp(&summaries[b].mean));
    let mut rank = vec![0usize; k];
    for (pos, &g) in order.iter().enumerate() {
        rank[g] = pos;
    }

    // tests[lo][hi] over sorted positions, lo < hi
    let mut tests: Vec<Vec<Option<RangeTest>>> = (0..k).map(|_| (0..k).map(|_| None).collect()).collect();
    for span in (2..=k).rev() {
        let crit = special::qtukey(1.0 - rule.span_alpha(alpha, span), span as f64, df);
        for lo in 0..=k - span {
            let hi = lo + span - 1;
            let range = summaries[order[hi]].mean - summaries[order[lo]].mean;
            let q = range / se;
            let p_value = (1.0 - special::ptukey(q, span as f64, df)).clamp(0.0, 1.0);
            let mut adjusted = rule.family_p(p_value, span);

            let parents = [
                lo.checked_sub(1).map(|l| (l, hi)),
                (hi + 1 < k).then_some((lo, hi + 1)),
            ];
            let mut protected = false;
            for (pl, ph) in parents.into_iter().flatten() {
                if let Some(parent) = &tests[pl][ph] {
                    adjusted = adjusted.max(parent.adjusted);
                    if !parent.significant {
                        protected = true;
                    }
                }
            }
            let significant = q > crit && !protected;
            if protected && q > crit {
                debug!(span, lo, hi, q, crit, "range forced non-significant by enclosing range");
            }
            tests[lo][hi] = Some(RangeTest {
                q,
                critical: crit,
                p_value,
                adjusted,
                significant,
                protected,
            });
        }
    }

    let mut out: Vec<PairwiseComparison> = pairs
        .iter()
        .filter_map(|&(i, j)| {
            let (lo, hi) = if rank[i] < rank[j] {
                (rank[i], rank[j])
            } else {
                (rank[j], rank[i])
            };
            let t = tests[lo][hi].as_ref()?;
            let diff = summaries[i].mean - summaries[j].mean;
            let span = hi - lo + 1;
            Some(PairwiseComparison {
                group1: i,
                group2: j,
                diff,
                std_error: se,
                statistic: t.q,
                critical: t.critical,
                p_value: t.p_value,
                adjusted_p_value: t.adjusted,
                ci_lower: diff - t.critical * se,
                ci_upper: diff + t.critical * se,
                rejected: t.significant,
                note: if t.protected {
                    format!("span {span}, protected")
                } else {
                    format!("span {span}")
                },
            })
        })
        .collect();
    out.sort_by_key(|c| (c.group1, c.group2));
    out
}
