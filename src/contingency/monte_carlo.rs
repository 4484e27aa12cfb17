//! Monte Carlo estimate of Fisher's exact test for R×C tables.
//!
//! Exact enumeration of every table with fixed margins is infeasible beyond
//! 2×2, so tables are sampled by a margin-preserving swap chain and the
//! p-value is the smoothed fraction of sampled tables at least as extreme
//! as the observed one.
//!
//! # Algorithm
//!
//! The extremeness metric of a table is `M = Σ ln(nᵢⱼ!)`. Under fixed
//! margins the table probability is proportional to `exp(−M)`, so larger
//! `M` means a less probable table.
//!
//! Each swap step picks rows r1 ≠ r2 and columns c1 ≠ c2 and, with
//! `a, b, c, d` the counts at (r1,c1), (r1,c2), (r2,c1), (r2,c2), draws
//! `k` uniformly from `[−min(a, d), min(b, c)]` and applies
//!
//! ```text
//! a += k   b −= k
//! c −= k   d += k
//! ```
//!
//! which leaves every row and column sum unchanged. A degenerate range is
//! a no-op step.
//!
//! After `burnin` discarded steps, `n_sim` further steps are taken and the
//! p-value is `(extreme + 1) / (n_sim + 1)`.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::debug;

use super::table::ContingencyTable;
use crate::error::{PostHocError, Result};
use crate::special;

/// Settings for a Monte Carlo session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonteCarloOptions {
    /// Number of sampled tables. Default: 100,000.
    pub n_sim: usize,
    /// Number of discarded swap steps before sampling. Default: 10,000.
    pub burnin: usize,
    /// Seed for the per-call generator; `None` draws one from the thread
    /// generator. Default: `None`.
    pub seed: Option<u64>,
    /// Absolute tolerance on the log metric when comparing against the
    /// observed table. Default: 1e-10.
    pub tolerance: f64,
    /// Confidence level of the simulation-error interval. Default: 0.95.
    pub confidence_level: f64,
}

impl Default for MonteCarloOptions {
    fn default() -> Self {
        Self {
            n_sim: 100_000,
            burnin: 10_000,
            seed: None,
            tolerance: 1e-10,
            confidence_level: 0.95,
        }
    }
}

impl MonteCarloOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of sampled tables.
    pub fn with_n_sim(mut self, n_sim: usize) -> Self {
        self.n_sim = n_sim;
        self
    }

    /// Sets the number of burn-in steps.
    pub fn with_burnin(mut self, burnin: usize) -> Self {
        self.burnin = burnin;
        self
    }

    /// Fixes the generator seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the extreme-table tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the confidence level of the reported interval.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PostHocError::InvalidInput(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(PostHocError::InvalidInput(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Outcome of a Monte Carlo session.
///
/// The confidence interval describes the *simulation error* of the
/// estimated p-value (how far it may sit from the p-value an infinitely
/// long run would give). It is not an interval for any population
/// parameter or effect size.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FisherMonteCarloResult {
    /// Smoothed p-value estimate, `(n_extreme + 1) / (n_sim + 1)`.
    pub p_value: f64,
    /// Lower bound of the simulation-error interval.
    pub ci_lower: f64,
    /// Upper bound of the simulation-error interval.
    pub ci_upper: f64,
    /// Confidence level of `[ci_lower, ci_upper]`.
    pub confidence_level: f64,
    /// Sampled tables counted as at least as extreme as the observed one.
    pub n_extreme: usize,
    /// Number of sampled tables.
    pub n_sim: usize,
    /// Number of discarded burn-in steps.
    pub burnin: usize,
    /// Swap steps that changed the table (burn-in included).
    pub n_accepted: usize,
    /// `Σ ln(nᵢⱼ!)` of the observed table.
    pub log_metric_observed: f64,
    /// Seed the generator was created from, when this crate created it.
    pub seed: Option<u64>,
}

impl FisherMonteCarloResult {
    /// Normal-approximation interval for the estimated p-value at `level`,
    /// clamped to [0, 1].
    pub fn confidence_interval(&self, level: f64) -> (f64, f64) {
        binomial_interval(self.p_value, self.n_sim, level)
    }
}

/// Monte Carlo Fisher test session over one observed table.
///
/// Holds the observed table and its metric; every run works on its own
/// scratch copy, so one session can be run any number of times (and from
/// several threads, each with its own generator).
#[derive(Debug, Clone)]
pub struct FisherMonteCarlo {
    table: ContingencyTable,
    log_metric_observed: f64,
}

impl FisherMonteCarlo {
    /// Prepares a session for `table`.
    ///
    /// Any table of at least 2×2 is accepted; callers wanting the most
    /// precise available test should go through
    /// [`FisherRxC::test`](super::FisherRxC::test), which routes 2×2 tables
    /// to the exact test.
    ///
    /// # Errors
    ///
    /// [`PostHocError::ShapeMismatch`] for fewer than 2 rows or columns.
    pub fn new(table: &ContingencyTable) -> Result<Self> {
        if table.n_rows() < 2 || table.n_cols() < 2 {
            return Err(PostHocError::ShapeMismatch(format!(
                "Monte Carlo Fisher test needs at least 2×2, got {}×{}",
                table.n_rows(),
                table.n_cols()
            )));
        }
        Ok(Self {
            table: table.clone(),
            log_metric_observed: log_metric(table.counts()),
        })
    }

    /// The observed table.
    pub fn table(&self) -> &ContingencyTable {
        &self.table
    }

    /// `Σ ln(nᵢⱼ!)` of the observed table.
    pub fn log_metric_observed(&self) -> f64 {
        self.log_metric_observed
    }

    /// Runs a session with a generator owned by this call.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_posthoc::contingency::{ContingencyTable, FisherMonteCarlo, MonteCarloOptions};
    ///
    /// let t = ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7], vec![12, 4, 10]]).unwrap();
    /// let mc = FisherMonteCarlo::new(&t).unwrap();
    /// let r = mc.run(&MonteCarloOptions::new().with_n_sim(2_000).with_seed(7)).unwrap();
    /// assert!(r.p_value > 0.0 && r.p_value <= 1.0);
    /// assert!(r.ci_lower <= r.ci_upper);
    /// ```
    pub fn run(&self, options: &MonteCarloOptions) -> Result<FisherMonteCarloResult> {
        options.validate()?;
        let seed = options.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut result = self.simulate(options, &mut rng);
        result.seed = Some(seed);
        Ok(result)
    }

    /// Runs a session driven by a caller-owned generator.
    pub fn run_with_rng<R: Rng + ?Sized>(
        &self,
        options: &MonteCarloOptions,
        rng: &mut R,
    ) -> Result<FisherMonteCarloResult> {
        options.validate()?;
        Ok(self.simulate(options, rng))
    }

    fn simulate<R: Rng + ?Sized>(
        &self,
        options: &MonteCarloOptions,
        rng: &mut R,
    ) -> FisherMonteCarloResult {
        debug!(
            rows = self.table.n_rows(),
            cols = self.table.n_cols(),
            n_sim = options.n_sim,
            burnin = options.burnin,
            "starting Monte Carlo Fisher session"
        );

        let n_rows = self.table.n_rows();
        let n_cols = self.table.n_cols();
        let mut work = self.table.counts().to_vec();
        let mut metric = self.log_metric_observed;
        let threshold = self.log_metric_observed - options.tolerance;
        let mut n_accepted = 0usize;

        for _ in 0..options.burnin {
            if swap_step(&mut work, n_rows, n_cols, rng) {
                n_accepted += 1;
            }
        }
        if n_accepted > 0 {
            metric = log_metric(&work);
        }

        let mut n_extreme = 0usize;
        for _ in 0..options.n_sim {
            if swap_step(&mut work, n_rows, n_cols, rng) {
                n_accepted += 1;
                metric = log_metric(&work);
            }
            if metric >= threshold {
                n_extreme += 1;
            }
        }

        let p_value = (n_extreme as f64 + 1.0) / (options.n_sim as f64 + 1.0);
        let (ci_lower, ci_upper) = binomial_interval(p_value, options.n_sim, options.confidence_level);

        debug!(n_extreme, n_accepted, p_value, "Monte Carlo Fisher session finished");

        FisherMonteCarloResult {
            p_value,
            ci_lower,
            ci_upper,
            confidence_level: options.confidence_level,
            n_extreme,
            n_sim: options.n_sim,
            burnin: options.burnin,
            n_accepted,
            log_metric_observed: self.log_metric_observed,
            seed: None,
        }
    }
}

/// `Σ ln(nᵢⱼ!)` over all cells.
pub(crate) fn log_metric(counts: &[u64]) -> f64 {
    counts.iter().map(|&n| special::ln_factorial(n)).sum()
}

/// One margin-preserving swap on a row-major `n_rows × n_cols` table.
///
/// Returns `true` if a non-degenerate range was drawn from.
pub(crate) fn swap_step<R: Rng + ?Sized>(
    counts: &mut [u64],
    n_rows: usize,
    n_cols: usize,
    rng: &mut R,
) -> bool {
    let (r1, r2) = distinct_pair(n_rows, rng);
    let (c1, c2) = distinct_pair(n_cols, rng);

    let ia = r1 * n_cols + c1;
    let ib = r1 * n_cols + c2;
    let ic = r2 * n_cols + c1;
    let id = r2 * n_cols + c2;

    let (a, b, c, d) = (counts[ia], counts[ib], counts[ic], counts[id]);
    let min_k = -(a.min(d) as i64);
    let max_k = b.min(c) as i64;
    if min_k >= max_k {
        return false;
    }

    let k = rng.random_range(min_k..=max_k);
    counts[ia] = (a as i64 + k) as u64;
    counts[ib] = (b as i64 - k) as u64;
    counts[ic] = (c as i64 - k) as u64;
    counts[id] = (d as i64 + k) as u64;
    true
}

// Two distinct indices from 0..n, uniformly without replacement (n >= 2).
fn distinct_pair<R: Rng + ?Sized>(n: usize, rng: &mut R) -> (usize, usize) {
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

fn binomial_interval(p_hat: f64, n_sim: usize, level: f64) -> (f64, f64) {
    let se = (p_hat * (1.0 - p_hat) / (n_sim as f64 + 1.0)).sqrt();
    let z = special::inverse_normal_cdf(1.0 - (1.0 - level) / 2.0);
    ((p_hat - z * se).max(0.0), (p_hat + z * se).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContingencyTable {
        ContingencyTable::new(vec![vec![5, 10, 2], vec![3, 15, 7], vec![12, 4, 10]])
            .expect("valid table")
    }

    #[test]
    fn end_to_end_three_by_three() {
        let mc = FisherMonteCarlo::new(&sample()).expect("session");
        let opts = MonteCarloOptions::new().with_n_sim(5_000).with_seed(2024);
        let r = mc.run(&opts).expect("run");
        assert!(r.p_value > 0.0 && r.p_value <= 1.0, "p = {}", r.p_value);
        assert!(r.ci_lower <= r.ci_upper);
        assert!((0.0..=1.0).contains(&r.ci_lower));
        assert!((0.0..=1.0).contains(&r.ci_upper));
        assert_eq!(r.n_sim, 5_000);
        assert_eq!(r.seed, Some(2024));
    }

    #[test]
    fn strong_association_gives_small_p() {
        let t = ContingencyTable::new(vec![vec![20, 0, 0], vec![0, 20, 0], vec![0, 0, 20]])
            .expect("valid");
        let mc = FisherMonteCarlo::new(&t).expect("session");
        let r = mc
            .run(&MonteCarloOptions::new().with_n_sim(5_000).with_burnin(1_000).with_seed(1))
            .expect("run");
        assert!(r.p_value < 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn same_seed_reproduces() {
        let mc = FisherMonteCarlo::new(&sample()).expect("session");
        let opts = MonteCarloOptions::new().with_n_sim(1_000).with_burnin(100).with_seed(99);
        let a = mc.run(&opts).expect("run");
        let b = mc.run(&opts).expect("run");
        assert_eq!(a, b);
    }

    #[test]
    fn zero_simulations() {
        let mc = FisherMonteCarlo::new(&sample()).expect("session");
        let r = mc
            .run(&MonteCarloOptions::new().with_n_sim(0).with_burnin(0).with_seed(3))
            .expect("run");
        assert!((r.p_value - 1.0).abs() < 1e-15);
        assert_eq!(r.n_extreme, 0);
    }

    #[test]
    fn observed_table_untouched() {
        let t = sample();
        let mc = FisherMonteCarlo::new(&t).expect("session");
        mc.run(&MonteCarloOptions::new().with_n_sim(500).with_seed(5))
            .expect("run");
        assert_eq!(mc.table(), &t);
        assert!((mc.log_metric_observed() - log_metric(t.counts())).abs() < 1e-12);
    }

    #[test]
    fn rejects_small_shapes_and_bad_options() {
        let one_row = ContingencyTable::new(vec![vec![1, 2, 3]]).expect("valid");
        assert!(FisherMonteCarlo::new(&one_row).is_err());

        let mc = FisherMonteCarlo::new(&sample()).expect("session");
        let bad = MonteCarloOptions::new().with_confidence_level(1.5);
        assert!(mc.run(&bad).is_err());
    }

    #[test]
    fn degenerate_swap_is_noop() {
        // A single non-zero cell admits no swap
        let mut counts = vec![0u64, 0, 0, 5];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for _ in 0..50 {
            assert!(!swap_step(&mut counts, 2, 2, &mut rng));
        }
        assert_eq!(counts, vec![0, 0, 0, 5]);
    }

    #[test]
    fn interval_narrows_with_more_simulations() {
        let r_small = binomial_interval(0.2, 100, 0.95);
        let r_large = binomial_interval(0.2, 10_000, 0.95);
        assert!(r_large.1 - r_large.0 < r_small.1 - r_small.0);
        let (lo, hi) = binomial_interval(0.001, 10, 0.95);
        assert_eq!(lo, 0.0);
        assert!(hi < 1.0);
    }
}
