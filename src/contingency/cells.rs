//! Cell-level post-hoc analysis of a contingency table.
//!
//! Each cell is tested for departure from independence, either through its
//! adjusted standardized residual or through a Fisher test of the cell
//! against the rest of the table. All cell p-values form one family for
//! multiplicity adjustment.

use std::fmt;
use std::str::FromStr;

use super::table::ContingencyTable;
use crate::correction::{self, AdjustMethod};
use crate::error::{check_alpha, PostHocError, Result};
use crate::special;
use crate::testing;

/// Cell-level test method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellMethod {
    /// Adjusted standardized residuals with a two-sided normal p-value.
    Asr,
    /// Exact Fisher test of each cell against the rest of the table.
    FisherOneVsAll,
}

impl CellMethod {
    const ALLOWED: &'static str = "asr, fisher_1vsall";

    /// The symbol this method is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellMethod::Asr => "asr",
            CellMethod::FisherOneVsAll => "fisher_1vsall",
        }
    }
}

impl fmt::Display for CellMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellMethod {
    type Err = PostHocError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asr" => Ok(CellMethod::Asr),
            "fisher_1vsall" => Ok(CellMethod::FisherOneVsAll),
            _ => Err(PostHocError::UnsupportedMethod {
                kind: "cell test",
                name: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Options for [`cell_test`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellTestOptions {
    /// Significance level (default 0.05).
    pub alpha: f64,
    /// Adjustment applied to the family of cell p-values (default Bonferroni).
    pub adjust: AdjustMethod,
}

impl Default for CellTestOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            adjust: AdjustMethod::Bonferroni,
        }
    }
}

impl CellTestOptions {
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
}

/// Per-cell results, each matrix shaped like the observed table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellTestResult {
    /// Test method.
    pub method: CellMethod,
    /// Adjustment applied across all cells.
    pub adjust: AdjustMethod,
    /// The analysed table, with its labels.
    pub observed: ContingencyTable,
    /// ASR z-score or smoothed odds ratio per cell.
    pub statistic: Vec<Vec<f64>>,
    /// Raw p-values.
    pub p_values: Vec<Vec<f64>>,
    /// Adjusted p-values.
    pub adjusted_p_values: Vec<Vec<f64>>,
    /// `adjusted_p_value < alpha`.
    pub significant: Vec<Vec<bool>>,
    /// Significance level.
    pub alpha: f64,
}

/// One row of the long-format cell export.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRow {
    /// Row label.
    pub row: String,
    /// Column label.
    pub column: String,
    /// Observed count.
    pub observed: u64,
    /// Cell statistic.
    pub stat: f64,
    /// Raw p-value.
    pub p_value: f64,
    /// Adjusted p-value.
    pub adj_p_value: f64,
    /// Significance flag.
    pub significant: bool,
}

impl CellRow {
    /// Column headers of the long-format export.
    pub const COLUMNS: [&'static str; 7] = [
        "Row",
        "Column",
        "Observed",
        "Stat",
        "P-value",
        "AdjP-value",
        "Significant",
    ];
}

/// Which per-cell quantity the wide export renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellValue {
    /// Observed counts.
    Observed,
    /// Cell statistics.
    Statistic,
    /// Raw p-values.
    PValue,
    /// Adjusted p-values.
    AdjustedPValue,
}

/// Labelled string matrix produced by [`CellTestResult::to_wide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideTable {
    /// Column labels.
    pub header: Vec<String>,
    /// `(row label, formatted cells)` per table row.
    pub rows: Vec<(String, Vec<String>)>,
}

impl CellTestResult {
    /// Long-format export, one row per cell in row-major order.
    pub fn to_long(&self) -> Vec<CellRow> {
        let t = &self.observed;
        let mut out = Vec::with_capacity(t.n_rows() * t.n_cols());
        for (i, row_label) in t.row_labels().iter().enumerate() {
            for (j, col_label) in t.col_labels().iter().enumerate() {
                out.push(CellRow {
                    row: row_label.clone(),
                    column: col_label.clone(),
                    observed: t.get(i, j),
                    stat: self.statistic[i][j],
                    p_value: self.p_values[i][j],
                    adj_p_value: self.adjusted_p_values[i][j],
                    significant: self.significant[i][j],
                });
            }
        }
        out
    }

    /// Wide export: one string per cell, suffixed `(*)` when significant.
    ///
    /// Counts render as integers, everything else with four decimals.
    pub fn to_wide(&self, value: CellValue) -> WideTable {
        let t = &self.observed;
        let rows = t
            .row_labels()
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let cells = (0..t.n_cols())
                    .map(|j| {
                        let text = match value {
                            CellValue::Observed => t.get(i, j).to_string(),
                            CellValue::Statistic => format!("{:.4}", self.statistic[i][j]),
                            CellValue::PValue => format!("{:.4}", self.p_values[i][j]),
                            CellValue::AdjustedPValue => {
                                format!("{:.4}", self.adjusted_p_values[i][j])
                            }
                        };
                        if self.significant[i][j] {
                            format!("{text}(*)")
                        } else {
                            text
                        }
                    })
                    .collect();
                (label.clone(), cells)
            })
            .collect();
        WideTable {
            header: t.col_labels().to_vec(),
            rows,
        }
    }

    /// Number of significant cells.
    pub fn n_significant(&self) -> usize {
        self.significant.iter().flatten().filter(|&&s| s).count()
    }
}

/// Tests every cell of `table` for departure from independence.
///
/// # Algorithm
///
/// - `Asr`: with `E = rᵢcⱼ/N`,
///   `z = (O − E) / √(E(1 − rᵢ/N)(1 − cⱼ/N))` (0 when the denominator
///   vanishes) and a two-sided normal p-value.
/// - `FisherOneVsAll`: the cell against the rest of the table,
///   `[[a, rᵢ−a], [cⱼ−a, N−rᵢ−cⱼ+a]]`, through the exact 2×2 test. The
///   statistic is the odds ratio with 0.5 added to every cell when any
///   cell is zero.
///
/// All cell p-values are adjusted together, then compared with alpha.
///
/// # Errors
///
/// [`PostHocError::InvalidAlpha`] for alpha outside (0, 1) and
/// [`PostHocError::InvalidInput`] for an all-zero table.
///
/// # Examples
///
/// ```
/// use u_posthoc::contingency::{cell_test, CellMethod, CellTestOptions, ContingencyTable};
///
/// let t = ContingencyTable::new(vec![vec![30, 5], vec![5, 30]]).unwrap();
/// let r = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).unwrap();
/// assert!(r.significant[0][0]);
/// assert!(r.statistic[0][0] > 0.0);
/// ```
pub fn cell_test(
    table: &ContingencyTable,
    method: CellMethod,
    options: &CellTestOptions,
) -> Result<CellTestResult> {
    check_alpha(options.alpha)?;
    let total = table.total();
    if total == 0 {
        return Err(PostHocError::InvalidInput(
            "cell tests need a table with a positive total".to_string(),
        ));
    }

    let row_sums = table.row_sums();
    let col_sums = table.col_sums();
    let (n_rows, n_cols) = (table.n_rows(), table.n_cols());

    let mut statistic = Vec::with_capacity(n_rows * n_cols);
    let mut raw = Vec::with_capacity(n_rows * n_cols);
    for (i, &r) in row_sums.iter().enumerate() {
        for (j, &c) in col_sums.iter().enumerate() {
            let a = table.get(i, j);
            let (stat, p) = match method {
                CellMethod::Asr => asr_cell(a, r, c, total),
                CellMethod::FisherOneVsAll => one_vs_all_cell(a, r, c, total),
            };
            statistic.push(stat);
            raw.push(p);
        }
    }

    let adjusted = correction::adjust(&raw, options.adjust);
    let significant: Vec<bool> = adjusted.iter().map(|&p| p < options.alpha).collect();

    Ok(CellTestResult {
        method,
        adjust: options.adjust,
        observed: table.clone(),
        statistic: reshape(&statistic, n_cols),
        p_values: reshape(&raw, n_cols),
        adjusted_p_values: reshape(&adjusted, n_cols),
        significant: reshape(&significant, n_cols),
        alpha: options.alpha,
    })
}

fn asr_cell(observed: u64, row_sum: u64, col_sum: u64, total: u64) -> (f64, f64) {
    let n = total as f64;
    let (r, c) = (row_sum as f64, col_sum as f64);
    let expected = r * c / n;
    let denom = (expected * (1.0 - r / n) * (1.0 - c / n)).sqrt();
    let z = if denom > 0.0 {
        (observed as f64 - expected) / denom
    } else {
        0.0
    };
    (z, special::normal_two_sided_p(z))
}

fn one_vs_all_cell(a: u64, row_sum: u64, col_sum: u64, total: u64) -> (f64, f64) {
    let b = row_sum - a;
    let c = col_sum - a;
    // total − r − c + a ≥ 0 always; add first to stay in range
    let d = total + a - row_sum - col_sum;
    let p = testing::fisher_exact_2x2(a, b, c, d).p_value;

    let cells = [a, b, c, d].map(|v| v as f64);
    let [a, b, c, d] = if cells.contains(&0.0) {
        cells.map(|v| v + 0.5)
    } else {
        cells
    };
    ((a * d) / (b * c), p)
}

fn reshape<T: Copy>(flat: &[T], n_cols: usize) -> Vec<Vec<T>> {
    flat.chunks(n_cols).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContingencyTable {
        ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7], vec![12, 4, 10]])
            .expect("valid")
    }

    #[test]
    fn parse_symbols() {
        assert_eq!("asr".parse::<CellMethod>(), Ok(CellMethod::Asr));
        assert_eq!(
            "fisher_1vsall".parse::<CellMethod>(),
            Ok(CellMethod::FisherOneVsAll)
        );
        assert!(matches!(
            "gtest".parse::<CellMethod>(),
            Err(PostHocError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn asr_known_value() {
        // [[30,5],[5,30]]: E = 17.5, r/N = c/N = 0.5
        // z = 12.5 / sqrt(17.5 · 0.25) = 5.9761
        let t = ContingencyTable::new(vec![vec![30, 5], vec![5, 30]]).expect("valid");
        let r = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).expect("ok");
        assert!((r.statistic[0][0] - 5.976_143).abs() < 1e-5);
        assert!((r.statistic[0][1] + 5.976_143).abs() < 1e-5);
        assert!(r.n_significant() == 4);
    }

    #[test]
    fn asr_residuals_sum_to_zero_along_2x2_rows() {
        let t = ContingencyTable::new(vec![vec![8, 2], vec![3, 9]]).expect("valid");
        let r = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).expect("ok");
        for row in &r.statistic {
            assert!((row[0] + row[1]).abs() < 1e-10);
        }
    }

    #[test]
    fn zero_margin_cell_has_zero_residual() {
        let t = ContingencyTable::new(vec![vec![4, 0], vec![6, 0]]).expect("valid");
        let r = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).expect("ok");
        assert_eq!(r.statistic[0][1], 0.0);
        assert!((r.p_values[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn one_vs_all_matches_exact_test() {
        let t = sample();
        let r = cell_test(&t, CellMethod::FisherOneVsAll, &CellTestOptions::default())
            .expect("ok");
        // cell (2,0): a = 12, b = 14, c = 8, d = 34
        let exact = testing::fisher_exact_2x2(12, 14, 8, 34);
        assert!((r.p_values[2][0] - exact.p_value).abs() < 1e-12);
        assert!((r.statistic[2][0] - (12.0 * 34.0) / (14.0 * 8.0)).abs() < 1e-12);
    }

    #[test]
    fn one_vs_all_smooths_zero_cells() {
        let t = ContingencyTable::new(vec![vec![0, 6], vec![5, 1]]).expect("valid");
        let r = cell_test(&t, CellMethod::FisherOneVsAll, &CellTestOptions::default())
            .expect("ok");
        let or = (0.5 * 1.5) / (6.5 * 5.5);
        assert!((r.statistic[0][0] - or).abs() < 1e-12);
        assert!(r.statistic.iter().flatten().all(|s| s.is_finite()));
    }

    #[test]
    fn adjustment_spans_all_cells() {
        let t = sample();
        let none = cell_test(
            &t,
            CellMethod::Asr,
            &CellTestOptions::new().with_adjust(AdjustMethod::None),
        )
        .expect("ok");
        let bonf = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).expect("ok");
        let p = none.p_values[0][0];
        assert!((bonf.adjusted_p_values[0][0] - (p * 9.0).min(1.0)).abs() < 1e-12);
        assert_eq!(none.p_values, none.adjusted_p_values);
    }

    #[test]
    fn exports() {
        let t = ContingencyTable::new(vec![vec![30, 5], vec![5, 30]])
            .expect("valid")
            .with_labels(
                Some(vec!["treated".into(), "control".into()]),
                Some(vec!["yes".into(), "no".into()]),
            )
            .expect("labels");
        let r = cell_test(&t, CellMethod::Asr, &CellTestOptions::default()).expect("ok");

        let long = r.to_long();
        assert_eq!(long.len(), 4);
        assert_eq!(long[1].row, "treated");
        assert_eq!(long[1].column, "no");
        assert_eq!(long[1].observed, 5);

        let wide = r.to_wide(CellValue::Observed);
        assert_eq!(wide.header, ["yes", "no"]);
        assert_eq!(wide.rows[0].0, "treated");
        assert_eq!(wide.rows[0].1[0], "30(*)");
    }

    #[test]
    fn rejects_empty_table_and_bad_alpha() {
        let t = ContingencyTable::new(vec![vec![0, 0], vec![0, 0]]).expect("valid");
        assert!(matches!(
            cell_test(&t, CellMethod::Asr, &CellTestOptions::default()),
            Err(PostHocError::InvalidInput(_))
        ));
        assert_eq!(
            cell_test(&sample(), CellMethod::Asr, &CellTestOptions::new().with_alpha(1.0))
                .unwrap_err(),
            PostHocError::InvalidAlpha(1.0)
        );
    }
}
