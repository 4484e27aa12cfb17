//! Multiple testing correction.
//!
//! Adjusts a family of raw p-values. Output order always matches input
//! order, since position is the only identity a p-value carries here.

use std::fmt;
use std::str::FromStr;

use crate::error::PostHocError;

/// p-value adjustment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdjustMethod {
    /// No adjustment.
    None,
    /// Bonferroni: controls the family-wise error rate (FWER).
    #[default]
    Bonferroni,
    /// Benjamini-Hochberg step-up: controls the false discovery rate (FDR).
    BenjaminiHochberg,
}

impl AdjustMethod {
    const ALLOWED: &'static str = "none, bonferroni, bh";

    /// The symbol this method is parsed from.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustMethod::None => "none",
            AdjustMethod::Bonferroni => "bonferroni",
            AdjustMethod::BenjaminiHochberg => "bh",
        }
    }
}

impl fmt::Display for AdjustMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustMethod {
    type Err = PostHocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AdjustMethod::None),
            "bonferroni" => Ok(AdjustMethod::Bonferroni),
            "bh" | "fdr" | "benjamini_hochberg" => Ok(AdjustMethod::BenjaminiHochberg),
            _ => Err(PostHocError::UnsupportedMethod {
                kind: "adjustment",
                name: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

/// Adjusts `p_values` with `method`.
///
/// Families of size 0 or 1 are returned unchanged regardless of method.
///
/// # Examples
///
/// ```
/// use u_posthoc::correction::{adjust, AdjustMethod};
///
/// let adj = adjust(&[0.01, 0.04, 0.03], AdjustMethod::BenjaminiHochberg);
/// assert!((adj[0] - 0.03).abs() < 1e-12);
/// assert!((adj[1] - 0.04).abs() < 1e-12);
/// ```
pub fn adjust(p_values: &[f64], method: AdjustMethod) -> Vec<f64> {
    if p_values.len() <= 1 {
        return p_values.to_vec();
    }
    match method {
        AdjustMethod::None => p_values.to_vec(),
        AdjustMethod::Bonferroni => bonferroni(p_values),
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
    }
}

/// Bonferroni correction: adjusted_pᵢ = min(pᵢ × m, 1).
pub fn bonferroni(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len() as f64;
    p_values.iter().map(|&p| (p * m).min(1.0)).collect()
}

/// Benjamini-Hochberg FDR correction.
///
/// # Algorithm
///
/// 1. Sort p-values ascending.
/// 2. For rank i (1-indexed) from m down to 1: pᵢ × m / i.
/// 3. Running minimum from the top, clamped to 1, then un-sorted.
///
/// # References
///
/// Benjamini & Hochberg (1995). "Controlling the false discovery rate".
/// JRSS-B, 57(1), 289–300.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut indices: Vec<usize> = (0..m).collect();
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mf = m as f64;
    let mut adjusted = vec![0.0; m];
    let mut cummin = f64::INFINITY;
    for (rank_rev, &orig_idx) in indices.iter().enumerate().rev() {
        let rank = rank_rev + 1;
        let adj = (p_values[orig_idx] * mf / rank as f64).min(1.0);
        cummin = cummin.min(adj);
        adjusted[orig_idx] = cummin;
    }
    adjusted
}
