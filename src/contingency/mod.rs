//! Contingency-table analysis.
//!
//! - [`ContingencyTable`]: labelled R×C counts, with a long-format pivot.
//! - [`FisherMonteCarlo`]: margin-preserving Monte Carlo estimate of
//!   Fisher's exact test for tables beyond 2×2.
//! - [`FisherRxC`]: picks the exact 2×2 test or the Monte Carlo estimate.
//! - [`cell_test`]: per-cell residual or one-vs-rest Fisher analysis.
//! - [`row_pairwise`]: pairwise homogeneity tests between rows.

mod cells;
mod fisher;
mod monte_carlo;
mod rows;
mod table;

pub use cells::{cell_test, CellMethod, CellRow, CellTestOptions, CellTestResult, CellValue, WideTable};
pub use fisher::{fisher_exact_table, FisherRxC};
pub use monte_carlo::{FisherMonteCarlo, FisherMonteCarloResult, MonteCarloOptions};
pub use rows::{row_pairwise, RowMethod, RowPairwiseOptions};
pub use table::ContingencyTable;
