//! Pairwise comparison of table rows.
//!
//! Every requested pair of rows is reduced to a 2×m sub-table and tested
//! for homogeneity with either a chi-squared test or the Fisher dispatch.
//! Pairs that leave fewer than two usable columns are flagged as
//! degenerate instead of failing the whole family.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::fisher::FisherRxC;
use super::monte_carlo::MonteCarloOptions;
use super::table::ContingencyTable;
use crate::correction::{self, AdjustMethod};
use crate::error::{check_alpha, PostHocError, Result};
use crate::posthoc::{
    compact_letter_display, resolve_pairs, PairwiseComparison, PostHocMethod, PostHocResult,
};
use crate::testing;

/// Row-pairwise test method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowMethod {
    /// Pearson chi-squared test of homogeneity.
    ChiSquare,
    /// Exact 2×2 Fisher test, or the Monte Carlo estimate for wider sub-tables.
    Fisher,
}

impl RowMethod {
    const ALLOWED: &'static str = "chisq, fisher";

    /// The symbol this method is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowMethod::ChiSquare => "chisq",
            RowMethod::Fisher => "fisher",
        }
    }
}

impl fmt::Display for RowMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowMethod::ChiSquare => f.write_str("Pairwise chi-squared"),
            RowMethod::Fisher => f.write_str("Pairwise Fisher"),
        }
    }
}

impl FromStr for RowMethod {
    type Err = PostHocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chisq" | "chi2" => Ok(RowMethod::ChiSquare),
            "fisher" => Ok(RowMethod::Fisher),
            _ => Err(PostHocError::UnsupportedMethod {
                kind: "row pairwise",
                name: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Options for [`row_pairwise`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowPairwiseOptions {
    /// Significance level (default 0.05).
    pub alpha: f64,
    /// Adjustment across the requested pairs (default Bonferroni).
    pub adjust: AdjustMethod,
    /// Row pairs to compare; `None` compares all pairs.
    pub pairs: Option<Vec<(usize, usize)>>,
    /// Compute a compact letter display over first-column proportions.
    pub cld: bool,
    /// Monte Carlo settings for Fisher tests on sub-tables wider than 2×2.
    pub monte_carlo: MonteCarloOptions,
}

impl Default for RowPairwiseOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            adjust: AdjustMethod::Bonferroni,
            pairs: None,
            cld: false,
            monte_carlo: MonteCarloOptions::default(),
        }
    }
}

impl RowPairwiseOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the significance level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the p-value adjustment.
    pub fn with_adjust(mut self, adjust: AdjustMethod) -> Self {
        self.adjust = adjust;
        self
    }

    /// Restricts the analysis to the given row pairs.
    pub fn with_pairs(mut self, pairs: Vec<(usize, usize)>) -> Self {
        self.pairs = Some(pairs);
        self
    }

    /// Enables or disables the compact letter display.
    pub fn with_cld(mut self, cld: bool) -> Self {
        self.cld = cld;
        self
    }

    /// Sets the Monte Carlo options.
    pub fn with_monte_carlo(mut self, monte_carlo: MonteCarloOptions) -> Self {
        self.monte_carlo = monte_carlo;
        self
    }
}

/// Compares rows of `table` pairwise.
///
/// # Algorithm
///
/// For each pair, columns whose two-row sum is zero are dropped. With fewer
/// than two usable columns (or an empty row) the pair is reported as
/// degenerate: statistic 0, p = 1, note `"Degenerate"`. Otherwise the
/// sub-table goes through the chosen test; Fisher comparisons note which
/// test ran. Raw p-values of all pairs are adjusted as one family.
///
/// `diff` is the difference in first-column proportion. Standard error,
/// critical value and confidence bounds are `NaN`.
///
/// When the Monte Carlo options carry a seed, pair `i` (in lexicographic
/// pair order) runs with `seed + i` so every sub-table gets its own stream.
///
/// # Errors
///
/// - [`PostHocError::InsufficientGroups`] for fewer than two rows.
/// - [`PostHocError::InvalidAlpha`] for alpha outside (0, 1).
/// - [`PostHocError::InvalidInput`] for out-of-range or self pairs.
///
/// # Examples
///
/// ```
/// use u_posthoc::contingency::{row_pairwise, ContingencyTable, RowMethod, RowPairwiseOptions};
///
/// let t = ContingencyTable::new(vec![vec![40, 10], vec![12, 38], vec![38, 12]]).unwrap();
/// let r = row_pairwise(&t, RowMethod::Fisher, &RowPairwiseOptions::default()).unwrap();
/// assert_eq!(r.comparisons.len(), 3);
/// assert!(r.comparison(0, 1).unwrap().rejected);
/// assert!(!r.comparison(0, 2).unwrap().rejected);
/// ```
pub fn row_pairwise(
    table: &ContingencyTable,
    method: RowMethod,
    options: &RowPairwiseOptions,
) -> Result<PostHocResult> {
    let k = table.n_rows();
    if k < 2 {
        return Err(PostHocError::InsufficientGroups {
            needed: 2,
            got: k,
            context: "row pairwise comparison",
        });
    }
    check_alpha(options.alpha)?;
    let pairs = resolve_pairs(options.pairs.as_deref(), k)?;

    let proportions = table.column_proportions(0);
    let mut comparisons: Vec<PairwiseComparison> = pairs
        .iter()
        .enumerate()
        .map(|(idx, &(i, j))| {
            let mc = match options.monte_carlo.seed {
                Some(seed) => options
                    .monte_carlo
                    .clone()
                    .with_seed(seed.wrapping_add(idx as u64)),
                None => options.monte_carlo.clone(),
            };
            compare_rows(table, i, j, method, &mc, proportions[i] - proportions[j])
        })
        .collect::<Result<_>>()?;

    let raw: Vec<f64> = comparisons.iter().map(|c| c.p_value).collect();
    let adjusted = correction::adjust(&raw, options.adjust);
    for (c, adj) in comparisons.iter_mut().zip(adjusted) {
        c.adjusted_p_value = adj;
        c.rejected = adj < options.alpha;
    }

    let mut warnings = Vec::new();
    let cld = if options.cld {
        let letters = compact_letter_display(&proportions, &comparisons, options.alpha)?;
        warnings.extend(letters.warnings);
        Some(letters.letters)
    } else {
        None
    };

    Ok(PostHocResult {
        method: PostHocMethod::Contingency(method),
        comparisons,
        alpha: options.alpha,
        cld,
        labels: table.row_labels().to_vec(),
        warnings,
    })
}

fn compare_rows(
    table: &ContingencyTable,
    i: usize,
    j: usize,
    method: RowMethod,
    monte_carlo: &MonteCarloOptions,
    diff: f64,
) -> Result<PairwiseComparison> {
    let usable: Vec<usize> = (0..table.n_cols())
        .filter(|&c| table.get(i, c) + table.get(j, c) > 0)
        .collect();
    let empty_row = table.row(i).iter().all(|&v| v == 0) || table.row(j).iter().all(|&v| v == 0);

    let mut comparison = PairwiseComparison {
        group1: i,
        group2: j,
        diff,
        std_error: f64::NAN,
        statistic: 0.0,
        critical: f64::NAN,
        p_value: 1.0,
        adjusted_p_value: 1.0,
        ci_lower: f64::NAN,
        ci_upper: f64::NAN,
        rejected: false,
        note: "Degenerate".to_string(),
    };
    if usable.len() < 2 || empty_row {
        debug!(row1 = i, row2 = j, usable = usable.len(), "degenerate row pair");
        return Ok(comparison);
    }

    let sub = table.select(&[i, j], &usable);
    match method {
        RowMethod::ChiSquare => {
            if let Some(r) = testing::chi_squared_independence(sub.counts(), 2, usable.len()) {
                comparison.statistic = r.statistic;
                comparison.p_value = r.p_value;
                comparison.note = format!("df = {}", r.df);
            }
        }
        RowMethod::Fisher => {
            let r = FisherRxC::test(&sub, monte_carlo)?;
            comparison.statistic = match &r {
                FisherRxC::Exact(e) => e.odds_ratio,
                FisherRxC::MonteCarlo(_) => f64::NAN,
            };
            comparison.p_value = r.p_value();
            comparison.note = r.kind().to_string();
        }
    }
    comparison.adjusted_p_value = comparison.p_value;
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContingencyTable {
        ContingencyTable::new(vec![vec![40, 10], vec![12, 38], vec![38, 12]]).expect("valid")
    }

    #[test]
    fn parse_symbols() {
        assert_eq!("chisq".parse::<RowMethod>(), Ok(RowMethod::ChiSquare));
        assert_eq!("FISHER".parse::<RowMethod>(), Ok(RowMethod::Fisher));
        let err = "gtest".parse::<RowMethod>().unwrap_err();
        assert!(err.to_string().contains("chisq, fisher"), "{err}");
    }

    #[test]
    fn chisq_all_pairs() {
        let r = row_pairwise(&sample(), RowMethod::ChiSquare, &RowPairwiseOptions::default())
            .expect("ok");
        assert_eq!(r.comparisons.len(), 3);
        let c01 = r.comparison(0, 1).expect("pair");
        assert!(c01.rejected);
        assert_eq!(c01.note, "df = 1");
        assert!((c01.diff - (0.8 - 0.24)).abs() < 1e-12);
        assert!(c01.std_error.is_nan());
        assert!(!r.comparison(0, 2).expect("pair").rejected);
        assert_eq!(r.labels, ["R1", "R2", "R3"]);
    }

    #[test]
    fn fisher_tags_exact_2x2() {
        let r = row_pairwise(&sample(), RowMethod::Fisher, &RowPairwiseOptions::default())
            .expect("ok");
        for c in &r.comparisons {
            assert_eq!(c.note, "Exact 2x2");
            assert!(c.adjusted_p_value >= c.p_value);
        }
    }

    #[test]
    fn fisher_wide_rows_use_monte_carlo() {
        let t = ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7], vec![12, 4, 10]])
            .expect("valid");
        let opts = RowPairwiseOptions::new()
            .with_monte_carlo(MonteCarloOptions::new().with_n_sim(2_000).with_burnin(200).with_seed(3));
        let r = row_pairwise(&t, RowMethod::Fisher, &opts).expect("ok");
        for c in &r.comparisons {
            assert_eq!(c.note, "Monte Carlo RxC");
            assert!(c.p_value > 0.0 && c.p_value <= 1.0);
        }
        let again = row_pairwise(&t, RowMethod::Fisher, &opts).expect("ok");
        let p = |res: &PostHocResult| -> Vec<f64> {
            res.comparisons.iter().map(|c| c.p_value).collect()
        };
        assert_eq!(p(&r), p(&again));
    }

    #[test]
    fn zero_columns_dropped_and_degenerate_flagged() {
        // column 1 is empty for rows 0/1; only column 0 and 2 remain
        let t = ContingencyTable::new(vec![vec![10, 0, 2], vec![3, 0, 9], vec![0, 0, 0]])
            .expect("valid");
        let r = row_pairwise(&t, RowMethod::ChiSquare, &RowPairwiseOptions::default())
            .expect("ok");
        assert_eq!(r.comparison(0, 1).expect("pair").note, "df = 1");

        let c02 = r.comparison(0, 2).expect("pair");
        assert_eq!(c02.note, "Degenerate");
        assert_eq!(c02.statistic, 0.0);
        assert_eq!(c02.p_value, 1.0);
        assert!(!c02.rejected);
    }

    #[test]
    fn single_usable_column_is_degenerate() {
        let t = ContingencyTable::new(vec![vec![5, 0], vec![7, 0]]).expect("valid");
        let r = row_pairwise(&t, RowMethod::Fisher, &RowPairwiseOptions::default())
            .expect("ok");
        assert_eq!(r.comparisons[0].note, "Degenerate");
    }

    #[test]
    fn requested_pairs_and_cld() {
        let opts = RowPairwiseOptions::new().with_pairs(vec![(2, 0), (1, 2)]).with_cld(true);
        let r = row_pairwise(&sample(), RowMethod::ChiSquare, &opts).expect("ok");
        assert_eq!(r.comparisons.len(), 2);
        assert_eq!((r.comparisons[0].group1, r.comparisons[0].group2), (0, 2));
        let cld = r.cld.as_ref().expect("letters");
        assert_eq!(cld[0], cld[2]);
        assert_ne!(cld[0], cld[1]);
    }

    #[test]
    fn comparisons_in_pair_order() {
        let opts = RowPairwiseOptions::new().with_pairs(vec![(1, 2), (0, 1)]);
        let r = row_pairwise(&sample(), RowMethod::ChiSquare, &opts).expect("ok");
        let order: Vec<_> = r.comparisons.iter().map(|c| (c.group1, c.group2)).collect();
        assert_eq!(order, [(0, 1), (1, 2)]);
    }

    #[test]
    fn rejects_single_row_and_bad_pairs() {
        let t = ContingencyTable::new(vec![vec![1, 2]]).expect("valid");
        assert!(matches!(
            row_pairwise(&t, RowMethod::ChiSquare, &RowPairwiseOptions::default()),
            Err(PostHocError::InsufficientGroups { .. })
        ));
        let opts = RowPairwiseOptions::new().with_pairs(vec![(0, 5)]);
        assert!(matches!(
            row_pairwise(&sample(), RowMethod::ChiSquare, &opts),
            Err(PostHocError::InvalidInput(_))
        ));
    }
}
