//! Shared state of a pipeline run.
//!
//! The [`CompilerContext`] owns the method bodies being optimized and the event log the
//! passes write to.

use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};

use crate::{
    assembly::MethodBody,
    compiler::events::{DerivedStats, EventLog},
};

/// Compiler context for the boxing pipeline.
///
/// All collection fields use thread-safe types so that methods can be processed in
/// parallel. Method bodies are keyed by name.
pub struct CompilerContext {
    /// Method bodies, mutated in place by passes.
    pub methods: DashMap<String, MethodBody>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Methods changed by at least one pass.
    pub processed_methods: DashSet<String>,

    /// When the context was created.
    start_time: Instant,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
            events: EventLog::new(),
            processed_methods: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Creates a context holding the given method bodies.
    #[must_use]
    pub fn with_methods(methods: impl IntoIterator<Item = MethodBody>) -> Self {
        let ctx = Self::new();
        for method in methods {
            ctx.add_method(method);
        }
        ctx
    }

    /// Adds a method body, replacing any previous body of the same name.
    pub fn add_method(&self, method: MethodBody) {
        self.methods.insert(method.name().to_string(), method);
    }

    /// Names of all methods, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns a copy of a method body.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<MethodBody> {
        self.methods.get(name).map(|entry| entry.value().clone())
    }

    /// Whether any pass changed the method.
    #[must_use]
    pub fn was_processed(&self, name: &str) -> bool {
        self.processed_methods.contains(name)
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Statistics derived from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events).with_time(self.elapsed())
    }

    /// Consumes the context, returning the method bodies sorted by name.
    #[must_use]
    pub fn into_methods(self) -> Vec<MethodBody> {
        let mut methods: Vec<MethodBody> = self.methods.into_iter().map(|(_, m)| m).collect();
        methods.sort_by(|a, b| a.name().cmp(b.name()));
        methods
    }
}
