//! Per-group summary statistics and input validation.
//!
//! Every engine in the crate works from the same three numbers per group:
//! size, mean and unbiased variance. Callers hand in borrowed slices which
//! are never mutated.

use statrs::statistics::{Data, Median, Statistics};

use crate::error::{PostHocError, Result};

/// Size, mean and variance of one group of observations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupSummary {
    /// Number of observations.
    pub n: usize,
    /// Sample mean.
    pub mean: f64,
    /// Unbiased sample variance (`NaN` when `n < 2`).
    pub variance: f64,
}

impl GroupSummary {
    /// Summarizes a slice of observations.
    pub fn from_slice(data: &[f64]) -> Self {
        let n = data.len();
        let mean = if n == 0 { f64::NAN } else { data.mean() };
        let variance = if n < 2 { f64::NAN } else { data.variance() };
        Self { n, mean, variance }
    }

    /// Standard error of the mean, √(v/n).
    pub fn std_error(&self) -> f64 {
        (self.variance / self.n as f64).sqrt()
    }
}

/// Median of a slice (`NaN` if empty).
pub(crate) fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    Data::new(data.to_vec()).median()
}

/// Validates a family of groups and summarizes each.
///
/// Requires at least two groups, every group non-empty, every value finite.
pub(crate) fn summarize_groups(
    groups: &[&[f64]],
    context: &'static str,
) -> Result<Vec<GroupSummary>> {
    if groups.len() < 2 {
        return Err(PostHocError::InsufficientGroups {
            needed: 2,
            got: groups.len(),
            context,
        });
    }
    groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            if g.is_empty() {
                return Err(PostHocError::InvalidInput(format!("group {i} is empty")));
            }
            if g.iter().any(|v| !v.is_finite()) {
                return Err(PostHocError::InvalidInput(format!(
                    "group {i} contains non-finite values"
                )));
            }
            Ok(GroupSummary::from_slice(g))
        })
        .collect()
}

/// Pooled within-group mean squared error and its residual degrees of
/// freedom: `mse = Σ(nᵢ−1)vᵢ / (N−k)`.
///
/// Groups of size 1 contribute nothing to the numerator.
pub(crate) fn pooled_mse(summaries: &[GroupSummary]) -> Result<(f64, f64)> {
    let total: usize = summaries.iter().map(|s| s.n).sum();
    let k = summaries.len();
    if total <= k {
        return Err(PostHocError::InvalidInput(format!(
            "no residual degrees of freedom ({total} observations in {k} groups)"
        )));
    }
    let ss: f64 = summaries
        .iter()
        .filter(|s| s.n > 1)
        .map(|s| (s.n as f64 - 1.0) * s.variance)
        .sum();
    let df = (total - k) as f64;
    Ok((ss / df, df))
}

/// Resolves display labels: the caller's labels when given (length must
/// match), otherwise `{prefix}1 .. {prefix}k`.
pub(crate) fn resolve_labels(labels: Option<&[&str]>, k: usize, prefix: &str) -> Result<Vec<String>> {
    match labels {
        Some(given) if given.len() != k => Err(PostHocError::ShapeMismatch(format!(
            "{} labels supplied for {k} entries",
            given.len()
        ))),
        Some(given) => Ok(given.iter().map(|s| (*s).to_string()).collect()),
        None => Ok((1..=k).map(|i| format!("{prefix}{i}")).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_basic() {
        let s = GroupSummary::from_slice(&[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(s.n, 4);
        assert!((s.mean - 5.0).abs() < 1e-12);
        // Σ(x−5)² = 20, / 3
        assert!((s.variance - 20.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn summary_singleton_has_nan_variance() {
        let s = GroupSummary::from_slice(&[3.0]);
        assert_eq!(s.n, 1);
        assert!(s.variance.is_nan());
    }

    #[test]
    fn median_even_and_odd() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-12);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn summarize_rejects_bad_input() {
        let g1 = [1.0, 2.0];
        assert!(matches!(
            summarize_groups(&[&g1], "test"),
            Err(PostHocError::InsufficientGroups { got: 1, .. })
        ));
        let empty: [f64; 0] = [];
        assert!(summarize_groups(&[&g1, &empty], "test").is_err());
        let nan = [1.0, f64::NAN];
        assert!(summarize_groups(&[&g1, &nan], "test").is_err());
    }

    #[test]
    fn pooled_mse_matches_hand_computation() {
        let a = GroupSummary::from_slice(&[1.0, 2.0, 3.0]); // v = 1
        let b = GroupSummary::from_slice(&[2.0, 4.0, 6.0]); // v = 4
        let (mse, df) = pooled_mse(&[a, b]).expect("should compute");
        assert!((df - 4.0).abs() < 1e-12);
        assert!((mse - (2.0 * 1.0 + 2.0 * 4.0) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn labels_default_and_mismatch() {
        let l = resolve_labels(None, 3, "G").expect("should resolve");
        assert_eq!(l, vec!["G1", "G2", "G3"]);
        assert!(resolve_labels(Some(&["a", "b"]), 3, "G").is_err());
    }
}
