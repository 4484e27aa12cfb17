//! Options shared by the group-based post-hoc engines.

/// Options for [`parametric_posthoc`](super::parametric_posthoc) and
/// [`nonparametric_posthoc`](super::nonparametric_posthoc).
///
/// # Examples
///
/// ```
/// use u_posthoc::posthoc::PostHocOptions;
///
/// let opts = PostHocOptions::new()
///     .with_alpha(0.01)
///     .with_pairs(vec![(0, 1), (0, 2)])
///     .with_cld(true);
/// assert_eq!(opts.alpha_levene, 0.05);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PostHocOptions {
    /// Family-wise significance level. Default: 0.05.
    pub alpha: f64,
    /// Level of the Levene pre-check below which an unequal-variance
    /// warning is raised (parametric engine only). Default: 0.05.
    pub alpha_levene: f64,
    /// Pairs to compare; `None` compares all `C(k, 2)` pairs.
    pub pairs: Option<Vec<(usize, usize)>>,
    /// Compute a compact letter display. Default: `false`.
    pub cld: bool,
}

impl Default for PostHocOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            alpha_levene: 0.05,
            pairs: None,
            cld: false,
        }
    }
}

impl PostHocOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the significance level.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the Levene pre-check level.
    pub fn with_alpha_levene(mut self, alpha_levene: f64) -> Self {
        self.alpha_levene = alpha_levene;
        self
    }

    /// Restricts the analysis to the given pairs.
    pub fn with_pairs(mut self, pairs: Vec<(usize, usize)>) -> Self {
        self.pairs = Some(pairs);
        self
    }

    /// Enables or disables the compact letter display.
    pub fn with_cld(mut self, cld: bool) -> Self {
        self.cld = cld;
        self
    }
}
