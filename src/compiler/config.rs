//! Configuration of the boxing pipeline.

pub use crate::analysis::boxing::TransparentOps;

/// Settings shared by the boxing passes and the [`PassScheduler`](super::PassScheduler).
///
/// # Example
///
/// ```rust
/// use boxelide::compiler::{BoxingConfig, TransparentOps};
///
/// let config = BoxingConfig::default()
///     .with_transparent_ops(TransparentOps::CAST)
///     .with_parallel(false);
/// assert!(!config.transparent_ops.contains(TransparentOps::NULL_TEST));
/// assert_eq!(config.max_iterations, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxingConfig {
    /// Unary operations a boxed value may pass through and still be eliminated.
    pub transparent_ops: TransparentOps,
    /// Maximum iterations of the whole pipeline.
    pub max_iterations: usize,
    /// Stop after this many consecutive iterations without changes.
    pub stable_iterations: usize,
    /// Maximum times a single pass is repeated over all methods in one iteration.
    pub max_phase_iterations: usize,
    /// Process methods on the rayon thread pool.
    pub parallel: bool,
}

impl Default for BoxingConfig {
    fn default() -> Self {
        Self {
            transparent_ops: TransparentOps::default(),
            max_iterations: 5,
            stable_iterations: 2,
            max_phase_iterations: 15,
            parallel: true,
        }
    }
}

impl BoxingConfig {
    /// Sets the transparent operations.
    #[must_use]
    pub fn with_transparent_ops(mut self, ops: TransparentOps) -> Self {
        self.transparent_ops = ops;
        self
    }

    /// Sets the pipeline iteration limits.
    #[must_use]
    pub fn with_iterations(mut self, max_iterations: usize, stable_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self.stable_iterations = stable_iterations;
        self
    }

    /// Sets the per-pass repetition limit.
    #[must_use]
    pub fn with_max_phase_iterations(mut self, max_phase_iterations: usize) -> Self {
        self.max_phase_iterations = max_phase_iterations;
        self
    }

    /// Enables or disables parallel processing of methods.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
