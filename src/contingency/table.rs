//! Labelled R×C table of non-negative counts.
//!
//! Counts are stored as a dense row-major matrix with two parallel label
//! vectors beside it. Unlabelled tables get generated labels `R1..Rn` and
//! `C1..Cn`.

use crate::error::{PostHocError, Result};

/// An R×C contingency table of counts.
///
/// # Invariants
///
/// - At least one row and one column.
/// - `row_labels.len() == n_rows`, `col_labels.len() == n_cols`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContingencyTable {
    counts: Vec<u64>,
    n_rows: usize,
    n_cols: usize,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
}

impl ContingencyTable {
    /// Builds a table from rows of counts with generated labels.
    ///
    /// # Errors
    ///
    /// [`PostHocError::ShapeMismatch`] if there are no rows, no columns, or
    /// the rows differ in length.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_posthoc::contingency::ContingencyTable;
    ///
    /// let t = ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7]]).unwrap();
    /// assert_eq!(t.row_sums(), vec![17, 25]);
    /// assert_eq!(t.col_labels(), ["C1", "C2", "C3"]);
    /// ```
    pub fn new(rows: Vec<Vec<u64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        if n_rows == 0 || n_cols == 0 {
            return Err(PostHocError::ShapeMismatch(format!(
                "table must have at least one row and one column, got {n_rows}×{n_cols}"
            )));
        }
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(PostHocError::ShapeMismatch(format!(
                "row {i} has {} columns, expected {n_cols}",
                r.len()
            )));
        }
        Ok(Self {
            counts: rows.into_iter().flatten().collect(),
            n_rows,
            n_cols,
            row_labels: (1..=n_rows).map(|i| format!("R{i}")).collect(),
            col_labels: (1..=n_cols).map(|j| format!("C{j}")).collect(),
        })
    }

    /// Replaces the row and/or column labels. `None` keeps the current ones.
    ///
    /// # Errors
    ///
    /// [`PostHocError::ShapeMismatch`] if a label vector has the wrong length.
    pub fn with_labels(
        mut self,
        row_labels: Option<Vec<String>>,
        col_labels: Option<Vec<String>>,
    ) -> Result<Self> {
        if let Some(rl) = row_labels {
            if rl.len() != self.n_rows {
                return Err(PostHocError::ShapeMismatch(format!(
                    "{} row labels for {} rows",
                    rl.len(),
                    self.n_rows
                )));
            }
            self.row_labels = rl;
        }
        if let Some(cl) = col_labels {
            if cl.len() != self.n_cols {
                return Err(PostHocError::ShapeMismatch(format!(
                    "{} column labels for {} columns",
                    cl.len(),
                    self.n_cols
                )));
            }
            self.col_labels = cl;
        }
        Ok(self)
    }

    /// Pivots long-format `(row, column, count)` triples into a dense table.
    ///
    /// Labels are ordered by first appearance, repeated combinations are
    /// summed, and absent combinations are filled with zero.
    pub fn from_long<R, C>(triples: &[(R, C, u64)]) -> Result<Self>
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        let mut row_labels: Vec<String> = Vec::new();
        let mut col_labels: Vec<String> = Vec::new();
        let mut cells: Vec<(usize, usize, u64)> = Vec::with_capacity(triples.len());

        for (r, c, count) in triples {
            let ri = position_or_push(&mut row_labels, r.as_ref());
            let ci = position_or_push(&mut col_labels, c.as_ref());
            cells.push((ri, ci, *count));
        }

        let n_rows = row_labels.len();
        let n_cols = col_labels.len();
        if n_rows == 0 {
            return Err(PostHocError::ShapeMismatch(
                "no observations to pivot".to_string(),
            ));
        }

        let mut counts = vec![0u64; n_rows * n_cols];
        for (ri, ci, count) in cells {
            counts[ri * n_cols + ci] += count;
        }

        Ok(Self {
            counts,
            n_rows,
            n_cols,
            row_labels,
            col_labels,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// `true` for exactly two rows and two columns.
    pub fn is_2x2(&self) -> bool {
        self.n_rows == 2 && self.n_cols == 2
    }

    /// Count at (`row`, `col`). Panics on out-of-range indices, like slice
    /// indexing.
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.counts[row * self.n_cols + col]
    }

    /// One row of counts.
    pub fn row(&self, row: usize) -> &[u64] {
        &self.counts[row * self.n_cols..(row + 1) * self.n_cols]
    }

    /// Row-major view of all counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Row labels.
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    /// Column labels.
    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    /// Per-row totals.
    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.chunks(self.n_cols).map(|r| r.iter().sum()).collect()
    }

    /// Per-column totals.
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_cols];
        for row in self.counts.chunks(self.n_cols) {
            for (s, &v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        sums
    }

    /// Grand total.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Share of each row's total falling in column `col` (`NaN` for an
    /// all-zero row).
    pub fn column_proportions(&self, col: usize) -> Vec<f64> {
        self.counts
            .chunks(self.n_cols)
            .map(|r| {
                let total: u64 = r.iter().sum();
                if total == 0 {
                    f64::NAN
                } else {
                    r[col] as f64 / total as f64
                }
            })
            .collect()
    }

    /// Sub-table built from the given row and column indices (in order),
    /// carrying their labels.
    pub(crate) fn select(&self, rows: &[usize], cols: &[usize]) -> Self {
        let counts = rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| (r, c)))
            .map(|(r, c)| self.get(r, c))
            .collect();
        Self {
            counts,
            n_rows: rows.len(),
            n_cols: cols.len(),
            row_labels: rows.iter().map(|&r| self.row_labels[r].clone()).collect(),
            col_labels: cols.iter().map(|&c| self.col_labels[c].clone()).collect(),
        }
    }
}

fn position_or_push(labels: &mut Vec<String>, label: &str) -> usize {
    match labels.iter().position(|l| l == label) {
        Some(i) => i,
        None => {
            labels.push(label.to_string());
            labels.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContingencyTable {
        ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7], vec![12, 4, 10]])
            .expect("valid table")
    }

    #[test]
    fn margins() {
        let t = sample();
        assert_eq!(t.row_sums(), vec![17, 25, 26]);
        assert_eq!(t.col_sums(), vec![20, 29, 19]);
        assert_eq!(t.total(), 68);
        assert_eq!(t.row(1), &[3, 15, 7]);
        assert_eq!(t.get(2, 0), 12);
    }

    #[test]
    fn generated_and_custom_labels() {
        let t = sample();
        assert_eq!(t.row_labels(), ["R1", "R2", "R3"]);
        let t = t
            .with_labels(Some(vec!["a".into(), "b".into(), "c".into()]), None)
            .expect("labels fit");
        assert_eq!(t.row_labels(), ["a", "b", "c"]);
        assert_eq!(t.col_labels(), ["C1", "C2", "C3"]);
        assert!(t.with_labels(None, Some(vec!["x".into()])).is_err());
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(ContingencyTable::new(vec![vec![1, 2], vec![3]]).is_err());
        assert!(ContingencyTable::new(vec![]).is_err());
        assert!(ContingencyTable::new(vec![vec![]]).is_err());
    }

    #[test]
    fn pivot_long_format() {
        let triples = [
            ("smoker", "yes", 12),
            ("smoker", "no", 3),
            ("non", "no", 20),
            ("smoker", "yes", 1),
        ];
        let t = ContingencyTable::from_long(&triples).expect("pivot");
        assert_eq!(t.row_labels(), ["smoker", "non"]);
        assert_eq!(t.col_labels(), ["yes", "no"]);
        assert_eq!(t.row(0), &[13, 3]);
        assert_eq!(t.row(1), &[0, 20]); // absent combination filled with 0
    }

    #[test]
    fn select_sub_table() {
        let t = sample();
        let s = t.select(&[0, 2], &[0, 2]);
        assert!(s.is_2x2());
        assert_eq!(s.counts(), &[5, 2, 12, 10]);
        assert_eq!(s.row_labels(), ["R1", "R3"]);
        assert_eq!(s.col_labels(), ["C1", "C3"]);
    }

    #[test]
    fn proportions() {
        let t = ContingencyTable::new(vec![vec![1, 3], vec![0, 0]]).expect("valid");
        let p = t.column_proportions(0);
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!(p[1].is_nan());
    }
}
