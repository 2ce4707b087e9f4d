//! Pass scheduler for orchestrating pass execution over many methods.
//!
//! The [`PassScheduler`] runs its passes in order. Each pass is repeated over all
//! methods until it stops changing anything, and the whole sequence is repeated until a
//! global fixpoint or the iteration limit is reached.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rayon::prelude::*;

use crate::{
    analysis::boxing::SymbolClassifier,
    compiler::{
        config::BoxingConfig,
        context::CompilerContext,
        events::EventKind,
        pass::MethodPass,
        passes::{RedundantBoxingPass, RedundantNullCheckPass},
    },
    Result,
};

/// Orchestrates pass execution to a fixpoint.
#[allow(clippy::struct_field_names)]
pub struct PassScheduler {
    /// Maximum iterations for the entire pipeline.
    max_iterations: usize,
    /// Number of stable iterations before stopping.
    stable_iterations: usize,
    /// Maximum repetitions of a single pass before moving on.
    max_phase_iterations: usize,
    /// Process methods on the rayon thread pool.
    parallel: bool,
    /// Passes, in execution order.
    pub passes: Vec<Box<dyn MethodPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(5, 2, 15)
    }
}

impl PassScheduler {
    /// Creates a new scheduler with the specified iteration limits and no passes.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum iterations for the entire pipeline before stopping.
    /// * `stable_iterations` - Stop early if no changes for this many iterations.
    /// * `max_phase_iterations` - Maximum repetitions of a single pass.
    #[must_use]
    pub fn new(max_iterations: usize, stable_iterations: usize, max_phase_iterations: usize) -> Self {
        Self {
            max_iterations,
            stable_iterations,
            max_phase_iterations,
            parallel: true,
            passes: Vec::new(),
        }
    }

    /// Creates the boxing pipeline: null-check elimination, then boxing elimination.
    #[must_use]
    pub fn boxing_pipeline(
        symbols: &Arc<dyn SymbolClassifier>,
        config: &BoxingConfig,
    ) -> Self {
        let mut scheduler = Self::new(
            config.max_iterations,
            config.stable_iterations,
            config.max_phase_iterations,
        )
        .with_parallel(config.parallel);
        scheduler.add_pass(Box::new(
            RedundantNullCheckPass::new(Arc::clone(symbols))
                .with_transparent_ops(config.transparent_ops),
        ));
        scheduler.add_pass(Box::new(
            RedundantBoxingPass::new(Arc::clone(symbols))
                .with_transparent_ops(config.transparent_ops),
        ));
        scheduler
    }

    /// Enables or disables parallel processing of methods.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Appends a pass.
    pub fn add_pass(&mut self, pass: Box<dyn MethodPass>) {
        self.passes.push(pass);
    }

    /// Repeats one pass over all methods until it stops changing anything.
    fn pass_to_fixpoint(
        ctx: &CompilerContext,
        pass: &mut dyn MethodPass,
        max_phase_iterations: usize,
        parallel: bool,
    ) -> Result<bool> {
        let mut any_changed = false;

        pass.initialize(ctx)?;
        ctx.events.record(EventKind::PassStarted).pass(pass.name());
        for _ in 0..max_phase_iterations {
            if !Self::run_pass_once(ctx, pass, parallel)? {
                break;
            }
            any_changed = true;
        }
        ctx.events.record(EventKind::PassCompleted).pass(pass.name());
        pass.finalize(ctx)?;

        Ok(any_changed)
    }

    /// Runs one pass once over all methods.
    ///
    /// Returns `true` if the pass changed any method. The first error aborts the run;
    /// every body is put back into the context either way.
    fn run_pass_once(ctx: &CompilerContext, pass: &dyn MethodPass, parallel: bool) -> Result<bool> {
        let any_changed = AtomicBool::new(false);
        let methods = ctx.method_names();

        let process = |name: &String| -> Result<()> {
            // Remove the body so no lock is held while the pass runs.
            let Some((name, mut method)) = ctx.methods.remove(name) else {
                return Ok(());
            };
            let result = if pass.should_run(&method, ctx) {
                pass.run_on_method(&mut method, ctx)
            } else {
                Ok(false)
            };
            ctx.methods.insert(name.clone(), method);

            match result {
                Ok(true) => {
                    any_changed.store(true, Ordering::Relaxed);
                    ctx.processed_methods.insert(name);
                }
                Ok(false) => {}
                Err(error) => {
                    ctx.events
                        .record(EventKind::Error)
                        .method(name)
                        .pass(pass.name())
                        .message(error.to_string());
                    return Err(error);
                }
            }
            Ok(())
        };

        if parallel {
            methods.par_iter().try_for_each(process)?;
        } else {
            methods.iter().try_for_each(process)?;
        }

        Ok(any_changed.load(Ordering::Relaxed))
    }

    /// Runs all passes to a global fixpoint.
    ///
    /// # Returns
    ///
    /// The number of iterations completed. Events are accumulated in `ctx.events`. If the
    /// last iteration still changed something, a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any pass on any method.
    pub fn run_pipeline(&mut self, ctx: &CompilerContext) -> Result<usize> {
        let mut stable_count = 0;
        let mut iterations = 0;
        let mut last_changed = false;
        let max_phase = self.max_phase_iterations;
        let parallel = self.parallel;

        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;
            let mut iteration_changed = false;

            for pass in &mut self.passes {
                if Self::pass_to_fixpoint(ctx, pass.as_mut(), max_phase, parallel)? {
                    iteration_changed = true;
                }
            }

            tracing::debug!(iteration = iterations, changed = iteration_changed, "pipeline iteration");
            last_changed = iteration_changed;

            if iteration_changed {
                stable_count = 0;
            } else {
                stable_count += 1;
                if stable_count >= self.stable_iterations {
                    break;
                }
            }
        }

        if last_changed {
            tracing::warn!(iterations, "pipeline stopped before reaching a fixpoint");
            ctx.events.warn(format!("no fixpoint after {iterations} iterations"));
        }

        Ok(iterations)
    }
}
