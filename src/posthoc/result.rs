//! Comparison records, the post-hoc result aggregate, and its exports.

use std::fmt;

use super::nonparametric::NonParametricMethod;
use super::parametric::ParametricMethod;
use crate::contingency::RowMethod;

/// One comparison between two groups (or table rows).
///
/// Indices are 0-based with `group1 < group2`. `diff` is always
/// `location[group1] − location[group2]`. Fields a method does not define
/// (e.g. the standard error of a chi-squared row comparison) are `NaN`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairwiseComparison {
    /// First group index.
    pub group1: usize,
    /// Second group index.
    pub group2: usize,
    /// Difference of location statistics.
    pub diff: f64,
    /// Standard error of `diff`.
    pub std_error: f64,
    /// Test statistic.
    pub statistic: f64,
    /// Critical value the statistic is compared against.
    pub critical: f64,
    /// Unadjusted p-value.
    pub p_value: f64,
    /// Multiplicity-adjusted p-value.
    pub adjusted_p_value: f64,
    /// Lower confidence bound for `diff`.
    pub ci_lower: f64,
    /// Upper confidence bound for `diff`.
    pub ci_upper: f64,
    /// Whether the null hypothesis of equal location is rejected.
    pub rejected: bool,
    /// Free-text annotation.
    pub note: String,
}

/// Which engine produced a [`PostHocResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PostHocMethod {
    /// Means-based comparison.
    Parametric(ParametricMethod),
    /// Rank-based comparison.
    NonParametric(NonParametricMethod),
    /// Row-wise contingency comparison.
    Contingency(RowMethod),
}

impl fmt::Display for PostHocMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostHocMethod::Parametric(m) => write!(f, "{m}"),
            PostHocMethod::NonParametric(m) => write!(f, "{m}"),
            PostHocMethod::Contingency(m) => write!(f, "{m}"),
        }
    }
}

/// All pairwise comparisons of one post-hoc analysis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostHocResult {
    /// Method that produced the comparisons.
    pub method: PostHocMethod,
    /// Comparisons sorted by `(group1, group2)`.
    pub comparisons: Vec<PairwiseComparison>,
    /// Significance level.
    pub alpha: f64,
    /// Compact letter display per group, when requested.
    pub cld: Option<Vec<String>>,
    /// Display label per group index.
    pub labels: Vec<String>,
    /// Non-fatal diagnostics raised during the analysis.
    pub warnings: Vec<String>,
}

/// One row of the long-format comparison export.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonRow {
    /// `"label1 - label2"`.
    pub contrast: String,
    /// Difference of location statistics.
    pub diff: f64,
    /// Standard error.
    pub std_err: f64,
    /// Test statistic.
    pub stat: f64,
    /// Critical value.
    pub critical: f64,
    /// Adjusted p-value.
    pub p_value: f64,
    /// Lower confidence bound.
    pub lower_ci: f64,
    /// Upper confidence bound.
    pub upper_ci: f64,
    /// Rejection flag.
    pub sig: bool,
    /// Annotation.
    pub note: String,
}

impl ComparisonRow {
    /// Column headers of the long-format export.
    pub const COLUMNS: [&'static str; 10] = [
        "Contrast", "Diff", "StdErr", "Stat", "Critical", "P-value", "LowerCI", "UpperCI", "Sig",
        "Note",
    ];
}

/// One row of the group-level letter export.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CldRow {
    /// 0-based group index.
    pub group_index: usize,
    /// Display label.
    pub group_label: String,
    /// Letters shared with statistically indistinguishable groups.
    pub cld: String,
}

impl PostHocResult {
    /// Long-format export: one row per comparison.
    pub fn to_rows(&self) -> Vec<ComparisonRow> {
        self.comparisons
            .iter()
            .map(|c| ComparisonRow {
                contrast: format!("{} - {}", self.label(c.group1), self.label(c.group2)),
                diff: c.diff,
                std_err: c.std_error,
                stat: c.statistic,
                critical: c.critical,
                p_value: c.adjusted_p_value,
                lower_ci: c.ci_lower,
                upper_ci: c.ci_upper,
                sig: c.rejected,
                note: c.note.clone(),
            })
            .collect()
    }

    /// Group-level letter export; `None` when no letters were computed.
    pub fn cld_rows(&self) -> Option<Vec<CldRow>> {
        let cld = self.cld.as_ref()?;
        Some(
            cld.iter()
                .enumerate()
                .map(|(i, letters)| CldRow {
                    group_index: i,
                    group_label: self.label(i).to_string(),
                    cld: letters.clone(),
                })
                .collect(),
        )
    }

    /// Comparisons whose null hypothesis was rejected.
    pub fn significant(&self) -> impl Iterator<Item = &PairwiseComparison> {
        self.comparisons.iter().filter(|c| c.rejected)
    }

    /// Looks up the comparison between two groups, in either order.
    pub fn comparison(&self, a: usize, b: usize) -> Option<&PairwiseComparison> {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        self.comparisons
            .iter()
            .find(|c| c.group1 == lo && c.group2 == hi)
    }

    fn label(&self, i: usize) -> &str {
        self.labels.get(i).map_or("?", String::as_str)
    }
}

impl fmt::Display for PostHocResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Post-hoc: {} (alpha = {})", self.method, self.alpha)?;
        writeln!(
            f,
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>4}  {}",
            ComparisonRow::COLUMNS[0],
            ComparisonRow::COLUMNS[1],
            ComparisonRow::COLUMNS[2],
            ComparisonRow::COLUMNS[3],
            ComparisonRow::COLUMNS[4],
            ComparisonRow::COLUMNS[5],
            ComparisonRow::COLUMNS[6],
            ComparisonRow::COLUMNS[7],
            ComparisonRow::COLUMNS[8],
            ComparisonRow::COLUMNS[9],
        )?;
        for r in self.to_rows() {
            writeln!(
                f,
                "{:<24} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>4}  {}",
                r.contrast,
                r.diff,
                r.std_err,
                r.stat,
                r.critical,
                r.p_value,
                r.lower_ci,
                r.upper_ci,
                if r.sig { "*" } else { "" },
                r.note,
            )?;
        }
        if let Some(rows) = self.cld_rows() {
            writeln!(f, "CLD:")?;
            for r in rows {
                writeln!(f, "  {:<20} {}", r.group_label, r.cld)?;
            }
        }
        for w in &self.warnings {
            writeln!(f, "warning: {w}")?;
        }
        Ok(())
    }
}
