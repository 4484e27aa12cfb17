//! # u-posthoc
//!
//! Omnibus tests and post-hoc multiple comparisons for grouped numeric data
//! and contingency tables.
//!
//! Everything operates on plain slices and count matrices. There is no I/O,
//! no global state, and every random draw comes from a generator owned by
//! the call that uses it.
//!
//! ## Modules
//!
//! - [`testing`] — Welch ANOVA, one-way ANOVA, Levene, exact 2×2 Fisher, χ² independence
//! - [`correction`] — p-value adjustment (none, Bonferroni, Benjamini–Hochberg)
//! - [`contingency`] — R×C tables, Monte Carlo Fisher test, cell and row post-hoc tests
//! - [`posthoc`] — Parametric and rank-based pairwise comparisons, compact letter display
//! - [`special`] — Distribution functions, including the Studentized range
//! - [`summary`] — Per-group size, mean and variance
//! - [`error`] — Error type shared by all fallible operations
//!
//! ## Design Philosophy
//!
//! - **Typed configuration**: methods are enums parsed from their usual
//!   symbols; unknown symbols fail with the accepted set
//! - **Advisory warnings**: emitted through `tracing` and recorded on results
//! - **Research-backed**: All algorithms reference academic literature

pub mod contingency;
pub mod correction;
pub mod error;
pub mod posthoc;
pub mod special;
pub mod summary;
pub mod testing;

pub use error::{PostHocError, Result};
