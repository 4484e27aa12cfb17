//! Fisher's exact test on a table of any shape.
//!
//! 2×2 tables always get the exact hypergeometric test; every larger table
//! goes to the Monte Carlo estimator.

use std::fmt;

use super::monte_carlo::{FisherMonteCarlo, FisherMonteCarloResult, MonteCarloOptions};
use super::table::ContingencyTable;
use crate::error::{PostHocError, Result};
use crate::testing::{self, FisherExact};

/// Exact 2×2 Fisher test on a [`ContingencyTable`].
///
/// # Errors
///
/// [`PostHocError::ShapeMismatch`] unless the table is exactly 2×2.
pub fn fisher_exact_table(table: &ContingencyTable) -> Result<FisherExact> {
    if !table.is_2x2() {
        return Err(PostHocError::ShapeMismatch(format!(
            "exact Fisher test requires a 2×2 table, got {}×{}",
            table.n_rows(),
            table.n_cols()
        )));
    }
    Ok(testing::fisher_exact_2x2(
        table.get(0, 0),
        table.get(0, 1),
        table.get(1, 0),
        table.get(1, 1),
    ))
}

/// Outcome of [`FisherRxC::test`]: which test ran, and its result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FisherRxC {
    /// Closed-form test on a 2×2 table.
    Exact(FisherExact),
    /// Monte Carlo estimate on a larger table.
    MonteCarlo(FisherMonteCarloResult),
}

impl FisherRxC {
    /// Runs the most precise Fisher test available for `table`.
    ///
    /// `options` is only consulted for tables larger than 2×2.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_posthoc::contingency::{ContingencyTable, FisherRxC, MonteCarloOptions};
    ///
    /// let t = ContingencyTable::new(vec![vec![3, 1], vec![1, 3]]).unwrap();
    /// let r = FisherRxC::test(&t, &MonteCarloOptions::default()).unwrap();
    /// assert!(r.is_exact());
    /// ```
    pub fn test(table: &ContingencyTable, options: &MonteCarloOptions) -> Result<Self> {
        if table.is_2x2() {
            return fisher_exact_table(table).map(FisherRxC::Exact);
        }
        FisherMonteCarlo::new(table)?
            .run(options)
            .map(FisherRxC::MonteCarlo)
    }

    /// The p-value of whichever test ran.
    pub fn p_value(&self) -> f64 {
        match self {
            FisherRxC::Exact(r) => r.p_value,
            FisherRxC::MonteCarlo(r) => r.p_value,
        }
    }

    /// `true` when the exact 2×2 test ran.
    pub fn is_exact(&self) -> bool {
        matches!(self, FisherRxC::Exact(_))
    }

    /// Short description of the test that ran.
    pub fn kind(&self) -> &'static str {
        match self {
            FisherRxC::Exact(_) => "Exact 2x2",
            FisherRxC::MonteCarlo(_) => "Monte Carlo RxC",
        }
    }
}

impl fmt::Display for FisherRxC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fisher {} (p = {:.6})", self.kind(), self.p_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_is_exact() {
        let t = ContingencyTable::new(vec![vec![3, 1], vec![1, 3]]).expect("valid");
        let r = FisherRxC::test(&t, &MonteCarloOptions::default()).expect("test");
        assert!(r.is_exact());
        assert_eq!(r.kind(), "Exact 2x2");
        assert!((r.p_value() - 0.485_714_285_7).abs() < 1e-8);
    }

    #[test]
    fn larger_table_is_monte_carlo() {
        let t = ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7]]).expect("valid");
        let opts = MonteCarloOptions::new().with_n_sim(500).with_seed(8);
        let r = FisherRxC::test(&t, &opts).expect("test");
        assert!(!r.is_exact());
        assert_eq!(r.kind(), "Monte Carlo RxC");
        assert!(r.to_string().starts_with("Fisher Monte Carlo RxC"));
    }

    #[test]
    fn exact_table_requires_two_by_two() {
        let t = ContingencyTable::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).expect("valid");
        assert!(matches!(
            fisher_exact_table(&t),
            Err(PostHocError::ShapeMismatch(_))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn two_by_two_always_exact(
            a in 0_u64..50,
            b in 0_u64..50,
            c in 0_u64..50,
            d in 0_u64..50,
        ) {
            let t = ContingencyTable::new(vec![vec![a, b], vec![c, d]]).expect("valid");
            let r = FisherRxC::test(&t, &MonteCarloOptions::new().with_n_sim(10)).expect("test");
            prop_assert!(r.is_exact());
        }
    }
}
