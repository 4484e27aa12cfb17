//! Pairwise post-hoc comparisons after an omnibus test.
//!
//! # Engines
//!
//! - [`parametric_posthoc`]: mean comparisons with pooled or Welch standard
//!   errors (LSD, Bonferroni, Šidák, Scheffé, Tukey HSD, Tamhane T2, and the
//!   stepwise SNK / Duncan multiple-range tests).
//! - [`nonparametric_posthoc`]: Dunn's z-test on mean ranks and the
//!   Nemenyi test.
//! - [`compact_letter_display`]: letter groupings from any set of
//!   comparisons.
//!
//! Groups are addressed by 0-based index. Labels only affect the exports.
//!
//! # Examples
//!
//! ```
//! use u_posthoc::posthoc::{parametric_posthoc, ParametricMethod, PostHocOptions};
//!
//! let a = [4.1, 5.0, 4.6, 5.3, 4.8];
//! let b = [6.2, 6.8, 7.1, 6.5, 6.9];
//! let c = [4.4, 5.1, 4.9, 4.7, 5.2];
//! let r = parametric_posthoc(
//!     &[&a, &b, &c],
//!     Some(&["a", "b", "c"]),
//!     ParametricMethod::Tukey,
//!     &PostHocOptions::default().with_cld(true),
//! )
//! .unwrap();
//! assert!(r.comparison(0, 1).unwrap().rejected);
//! assert!(!r.comparison(0, 2).unwrap().rejected);
//! assert_eq!(r.to_rows().len(), 3);
//! ```

mod cld;
mod nonparametric;
mod options;
mod parametric;
mod result;
mod stepwise;

pub use cld::{compact_letter_display, LetterDisplay};
pub use nonparametric::{nonparametric_posthoc, NonParametricMethod};
pub use options::PostHocOptions;
pub use parametric::{parametric_posthoc, ParametricMethod};
pub use result::{CldRow, ComparisonRow, PairwiseComparison, PostHocMethod, PostHocResult};

use crate::error::{PostHocError, Result};

/// Normalizes requested pairs to `(low, high)`, or enumerates all
/// `C(k, 2)` pairs when none are given.
///
/// Duplicates (in either orientation) are kept once. The result is always
/// in lexicographic order, whatever order the pairs were requested in.
pub(crate) fn resolve_pairs(pairs: Option<&[(usize, usize)]>, k: usize) -> Result<Vec<(usize, usize)>> {
    let Some(pairs) = pairs else {
        return Ok((0..k)
            .flat_map(|i| (i + 1..k).map(move |j| (i, j)))
            .collect());
    };
    let mut out: Vec<(usize, usize)> = Vec::with_capacity(pairs.len());
    for &(a, b) in pairs {
        if a >= k || b >= k {
            return Err(PostHocError::InvalidInput(format!(
                "pair ({a}, {b}) out of range for {k} groups"
            )));
        }
        if a == b {
            return Err(PostHocError::InvalidInput(format!(
                "pair ({a}, {b}) compares a group with itself"
            )));
        }
        out.push((a.min(b), a.max(b)));
    }
    out.sort_unstable();
    out.dedup();
    if out.is_empty() {
        return Err(PostHocError::InvalidInput(
            "no pairs requested".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pairs_lexicographic() {
        let p = resolve_pairs(None, 4).expect("ok");
        assert_eq!(p, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn requested_pairs_normalized() {
        let p = resolve_pairs(Some(&[(2, 0), (1, 3), (0, 2)]), 4).expect("ok");
        assert_eq!(p, vec![(0, 2), (1, 3)]);
    }

    #[test]
    fn requested_pairs_sorted() {
        let p = resolve_pairs(Some(&[(2, 3), (1, 2), (0, 1)]), 4).expect("ok");
        assert_eq!(p, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn invalid_pairs() {
        assert!(resolve_pairs(Some(&[(0, 4)]), 4).is_err());
        assert!(resolve_pairs(Some(&[(1, 1)]), 4).is_err());
        assert!(resolve_pairs(Some(&[]), 4).is_err());
    }
}
