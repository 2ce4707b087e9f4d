//! The trait implemented by every pass of the boxing pipeline.

use crate::{assembly::MethodBody, compiler::context::CompilerContext, Result};

/// A transformation over a single method body.
///
/// All passes must be thread-safe (Send + Sync) so that the scheduler can run one pass
/// over many methods in parallel. A pass receives exclusive access to the body it works
/// on and shared access to the context.
pub trait MethodPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific method?
    ///
    /// Called before `run_on_method`. Override to skip methods the pass cannot improve.
    fn should_run(&self, _method: &MethodBody, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass on a single method body.
    ///
    /// Returns `true` if the body changed. Events should be recorded to `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method cannot be analyzed or a rewrite site is malformed.
    fn run_on_method(&self, method: &mut MethodBody, ctx: &CompilerContext) -> Result<bool>;

    /// Called once before the pass runs over all methods.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass ran over all methods.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
