//! Structured error types for post-hoc analysis.
//!
//! Only configuration and data-shape problems are errors. Degenerate
//! sub-computations inside a comparison family (an empty swap range, a row
//! pair with fewer than two usable columns) are handled locally and never
//! surface here.

use thiserror::Error;

/// Unified error type for all `u-posthoc` operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PostHocError {
    /// A method symbol that the selected engine does not implement.
    #[error("unsupported {kind} method `{name}`; expected one of: {allowed}")]
    UnsupportedMethod {
        /// Which engine rejected the symbol (e.g. "adjustment", "parametric").
        kind: &'static str,
        /// The offending symbol as given by the caller.
        name: String,
        /// Comma-separated list of accepted symbols.
        allowed: &'static str,
    },

    /// Significance level outside the open interval (0, 1).
    #[error("alpha must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),

    /// Too few groups (or rows) for the requested operation.
    #[error("{context} requires at least {needed} groups, got {got}")]
    InsufficientGroups {
        /// Minimum number of groups accepted.
        needed: usize,
        /// Number of groups supplied.
        got: usize,
        /// The operation that rejected the input.
        context: &'static str,
    },

    /// Table or label dimensions do not fit the operation.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A group whose size or spread makes a formula undefined.
    #[error("group {index} is degenerate: {reason}")]
    DegenerateGroup {
        /// 0-based index of the offending group.
        index: usize,
        /// Human-readable description (e.g. "zero variance").
        reason: &'static str,
    },

    /// Malformed input values (non-finite data, bad pair indices, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PostHocError>;

/// Rejects any alpha outside (0, 1).
pub(crate) fn check_alpha(alpha: f64) -> Result<()> {
    if alpha.is_finite() && alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(PostHocError::InvalidAlpha(alpha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_method_names_allowed_set() {
        let e = PostHocError::UnsupportedMethod {
            kind: "adjustment",
            name: "holm".into(),
            allowed: "none, bonferroni, bh",
        };
        let msg = e.to_string();
        assert!(msg.contains("holm"), "{msg}");
        assert!(msg.contains("none, bonferroni, bh"), "{msg}");
    }

    #[test]
    fn alpha_bounds() {
        assert!(check_alpha(0.05).is_ok());
        assert_eq!(check_alpha(0.0), Err(PostHocError::InvalidAlpha(0.0)));
        assert!(check_alpha(1.0).is_err());
        assert!(check_alpha(f64::NAN).is_err());
    }
}
