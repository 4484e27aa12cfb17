//! Compact letter display.
//!
//! Groups sharing a letter are not significantly different from each
//! other. Letters come from maximal cliques of the "not rejected" graph,
//! grown greedily in descending order of the location statistic.

use tracing::warn;

use super::result::PairwiseComparison;
use crate::error::{check_alpha, PostHocError, Result};

/// Letters per group plus any advisory warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterDisplay {
    /// Letter string per group index.
    pub letters: Vec<String>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<String>,
}

/// Builds the compact letter display for `location.len()` groups.
///
/// # Algorithm
///
/// 1. Start from a fully connected graph and cut every rejected pair.
/// 2. Order groups by descending location.
/// 3. From each group in that order, grow a clique by adding every later
///    group connected to all current members.
/// 4. Keep only maximal cliques (drop subsets and duplicates), ordered by
///    their largest location.
/// 5. Label cliques `a, b, ...` (`A, B, ...` when alpha ≤ 0.01). Past 26
///    cliques the label gains a numeric suffix (`a1`, `b1`, ...).
///
/// A group collects the labels of every clique it belongs to. With more
/// than 26 cliques the labels are joined with `.` (`a.b1`) so that `a1`
/// never reads as `a` followed by something else.
///
/// # Errors
///
/// - [`PostHocError::InvalidAlpha`] for alpha outside (0, 1).
/// - [`PostHocError::InvalidInput`] if a comparison names a group beyond
///   `location.len()`.
///
/// # Examples
///
/// ```
/// use u_posthoc::posthoc::{compact_letter_display, PairwiseComparison};
///
/// let cmp = |g1, g2, rejected| PairwiseComparison {
///     group1: g1, group2: g2, diff: 0.0, std_error: 0.0, statistic: 0.0,
///     critical: 0.0, p_value: 0.0, adjusted_p_value: 0.0, ci_lower: 0.0,
///     ci_upper: 0.0, rejected, note: String::new(),
/// };
/// let comparisons = [cmp(0, 1, true), cmp(0, 2, false), cmp(1, 2, false)];
/// let d = compact_letter_display(&[5.0, 1.0, 3.0], &comparisons, 0.05).unwrap();
/// assert_eq!(d.letters, ["a", "b", "ab"]);
/// ```
pub fn compact_letter_display(
    location: &[f64],
    comparisons: &[PairwiseComparison],
    alpha: f64,
) -> Result<LetterDisplay> {
    check_alpha(alpha)?;
    let mut warnings = Vec::new();
    if alpha > 0.1 {
        let msg = format!("alpha = {alpha} exceeds 0.1; Type I error risk is elevated");
        warn!(alpha, "{msg}");
        warnings.push(msg);
    }

    let k = location.len();
    let mut connected = vec![vec![true; k]; k];
    for c in comparisons {
        if c.group1 >= k || c.group2 >= k {
            return Err(PostHocError::InvalidInput(format!(
                "comparison ({}, {}) out of range for {k} groups",
                c.group1, c.group2
            )));
        }
        if c.rejected {
            connected[c.group1][c.group2] = false;
            connected[c.group2][c.group1] = false;
        }
    }

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| location[b].total_cmp(&location[a]));

    let mut grown: Vec<Vec<usize>> = Vec::with_capacity(k);
    for (pos, &seed) in order.iter().enumerate() {
        let mut clique = vec![seed];
        for &g in &order[pos + 1..] {
            if clique.iter().all(|&m| connected[m][g]) {
                clique.push(g);
            }
        }
        grown.push(clique);
    }

    let mut cliques: Vec<Vec<usize>> = Vec::new();
    for (i, c) in grown.iter().enumerate() {
        let redundant = grown.iter().enumerate().any(|(j, other)| {
            i != j
                && is_subset(c, other)
                && (other.len() > c.len() || j < i)
        });
        if !redundant {
            cliques.push(c.clone());
        }
    }

    let peak = |c: &[usize]| {
        c.iter()
            .map(|&g| location[g])
            .fold(f64::NEG_INFINITY, f64::max)
    };
    cliques.sort_by(|a, b| peak(b.as_slice()).total_cmp(&peak(a.as_slice())));

    let uppercase = alpha <= 0.01;
    let separator = if cliques.len() > 26 { "." } else { "" };
    let mut labels: Vec<Vec<String>> = vec![Vec::new(); k];
    for (idx, clique) in cliques.iter().enumerate() {
        let label = clique_label(idx, uppercase);
        for &g in clique {
            labels[g].push(label.clone());
        }
    }
    let letters = labels.into_iter().map(|l| l.join(separator)).collect();

    Ok(LetterDisplay { letters, warnings })
}

fn is_subset(small: &[usize], big: &[usize]) -> bool {
    small.iter().all(|g| big.contains(g))
}

fn clique_label(idx: usize, uppercase: bool) -> String {
    let base = if uppercase { b'A' } else { b'a' };
    let letter = char::from(base + (idx % 26) as u8);
    match idx / 26 {
        0 => letter.to_string(),
        round => format!("{letter}{round}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(g1: usize, g2: usize, rejected: bool) -> PairwiseComparison {
        PairwiseComparison {
            group1: g1,
            group2: g2,
            diff: 0.0,
            std_error: 0.0,
            statistic: 0.0,
            critical: 0.0,
            p_value: 0.0,
            adjusted_p_value: 0.0,
            ci_lower: 0.0,
            ci_upper: 0.0,
            rejected,
            note: String::new(),
        }
    }

    #[test]
    fn nothing_rejected_single_letter() {
        let c = [cmp(0, 1, false), cmp(0, 2, false), cmp(1, 2, false)];
        let d = compact_letter_display(&[1.0, 2.0, 3.0], &c, 0.05).expect("ok");
        assert_eq!(d.letters, ["a", "a", "a"]);
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn everything_rejected_distinct_letters() {
        let c = [cmp(0, 1, true), cmp(0, 2, true), cmp(1, 2, true)];
        let d = compact_letter_display(&[1.0, 2.0, 3.0], &c, 0.05).expect("ok");
        // highest location gets 'a'
        assert_eq!(d.letters, ["c", "b", "a"]);
    }

    #[test]
    fn overlapping_groups() {
        // 0 > 1 > 2 > 3; 0 differs from 2 and 3, 1 differs from 3
        let c = [
            cmp(0, 1, false),
            cmp(0, 2, true),
            cmp(0, 3, true),
            cmp(1, 2, false),
            cmp(1, 3, true),
            cmp(2, 3, false),
        ];
        let d = compact_letter_display(&[10.0, 8.0, 6.0, 4.0], &c, 0.05).expect("ok");
        assert_eq!(d.letters, ["a", "ab", "bc", "c"]);
    }

    #[test]
    fn uppercase_for_strict_alpha_and_warning_for_loose() {
        let c = [cmp(0, 1, true)];
        let d = compact_letter_display(&[2.0, 1.0], &c, 0.01).expect("ok");
        assert_eq!(d.letters, ["A", "B"]);
        let d = compact_letter_display(&[2.0, 1.0], &c, 0.2).expect("ok");
        assert_eq!(d.warnings.len(), 1);
    }

    #[test]
    fn invalid_alpha_and_out_of_range() {
        assert_eq!(
            compact_letter_display(&[1.0, 2.0], &[], 0.0).unwrap_err(),
            PostHocError::InvalidAlpha(0.0)
        );
        assert!(compact_letter_display(&[1.0, 2.0], &[cmp(0, 2, true)], 0.05).is_err());
    }

    #[test]
    fn labels_past_twenty_six() {
        assert_eq!(clique_label(0, false), "a");
        assert_eq!(clique_label(25, false), "z");
        assert_eq!(clique_label(26, false), "a1");
        assert_eq!(clique_label(53, true), "B2");
    }

    #[test]
    fn thirty_distinct_groups() {
        let k = 30;
        let location: Vec<f64> = (0..k).map(|i| i as f64).collect();
        let c: Vec<_> = (0..k)
            .flat_map(|i| (i + 1..k).map(move |j| cmp(i, j, true)))
            .collect();
        let d = compact_letter_display(&location, &c, 0.05).expect("ok");
        assert_eq!(d.letters[k - 1], "a");
        assert_eq!(d.letters[0], "d1");
    }

    #[test]
    fn shared_groups_past_twenty_six_are_separated() {
        // 29 groups, all different except 28~27 and 27~26
        let k = 29;
        let location: Vec<f64> = (0..k).map(|i| i as f64).collect();
        let c: Vec<_> = (0..k)
            .flat_map(|i| (i + 1..k).map(move |j| (i, j)))
            .map(|(i, j)| cmp(i, j, !matches!((i, j), (27, 28) | (26, 27))))
            .collect();
        let d = compact_letter_display(&location, &c, 0.05).expect("ok");
        assert_eq!(d.letters[28], "a");
        assert_eq!(d.letters[27], "a.b");
        assert_eq!(d.letters[26], "b");
        assert_eq!(d.letters[2], "z");
        assert_eq!(d.letters[1], "a1");
        assert_eq!(d.letters[0], "b1");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rejected_pairs_never_share_a_letter(
            location in proptest::collection::vec(-10.0_f64..10.0, 2..8),
            flags in proptest::collection::vec(any::<bool>(), 28),
        ) {
            let k = location.len();
            let comparisons: Vec<_> = (0..k)
                .flat_map(|i| (i + 1..k).map(move |j| (i, j)))
                .zip(&flags)
                .map(|((i, j), &r)| tests_cmp(i, j, r))
                .collect();
            let d = compact_letter_display(&location, &comparisons, 0.05).expect("ok");
            for c in comparisons.iter().filter(|c| c.rejected) {
                let a = &d.letters[c.group1];
                let b = &d.letters[c.group2];
                prop_assert!(!a.chars().any(|ch| b.contains(ch)), "{} vs {}", a, b);
            }
            for l in &d.letters {
                prop_assert!(!l.is_empty());
            }
        }
    }

    fn tests_cmp(g1: usize, g2: usize, rejected: bool) -> PairwiseComparison {
        PairwiseComparison {
            group1: g1,
            group2: g2,
            diff: 0.0,
            std_error: 0.0,
            statistic: 0.0,
            critical: 0.0,
            p_value: 0.0,
            adjusted_p_value: 0.0,
            ci_lower: 0.0,
            ci_upper: 0.0,
            rejected,
            note: String::new(),
        }
    }
}
