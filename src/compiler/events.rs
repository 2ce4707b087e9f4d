//! Event logging for the boxing pipeline.
//!
//! Every rewrite a pass performs is recorded as an [`Event`] in an append-only
//! [`EventLog`]. Statistics are derived from the log instead of being tracked
//! separately, so per-pass reports and pipeline summaries always agree.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (rewrite, pass boundary, warning or error)
//! - [`EventLog`] - Thread-safe collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API returned by [`EventLog::record`]
//! - [`DerivedStats`] - Counters computed from a log
//!
//! # Example
//!
//! ```rust
//! use boxelide::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::BoxingEliminated)
//!     .at("sum", 3)
//!     .message("core.Int box site #3");
//! log.warn("no fixpoint after 5 iterations");
//!
//! assert_eq!(log.count_kind(EventKind::BoxingEliminated), 1);
//! assert_eq!(log.summary(), "1 boxing eliminated");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use strum::EnumIter;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum EventKind {
    /// A box site and everything attached to it was eliminated.
    BoxingEliminated,
    /// An instruction was removed.
    InstructionRemoved,
    /// A null test on a value that is never null was removed.
    NullCheckRemoved,
    /// A conditional branch was rewritten into an unconditional one.
    BranchSimplified,
    /// A generic iterator `next()` was replaced by its primitive accessor.
    IteratorSpecialized,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// The pipeline stopped while passes were still changing methods.
    Warning,
    /// A pass failed on a method.
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::BoxingEliminated => "boxing eliminated",
            Self::InstructionRemoved => "instruction removed",
            Self::NullCheckRemoved => "null check removed",
            Self::BranchSimplified => "branch simplified",
            Self::IteratorSpecialized => "iterator specialized",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::BoxingEliminated
                | Self::InstructionRemoved
                | Self::NullCheckRemoved
                | Self::BranchSimplified
                | Self::IteratorSpecialized
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Name of the method the event occurred in.
    pub method: Option<String>,
    /// Instruction position within the method, before the rewrite.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Name of the pass that raised the event.
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.method, self.location) {
            (Some(method), Some(location)) => {
                write!(f, "[{}] {method}@{location}: {}", self.kind, self.message)
            }
            (Some(method), None) => write!(f, "[{}] {method}: {}", self.kind, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is
/// dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<String>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and instruction position where the event occurred.
    pub fn at(mut self, method: impl Into<String>, location: usize) -> Self {
        self.method = Some(method.into());
        self.location = Some(location);
        self
    }

    /// Sets only the method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only collection of pipeline events.
///
/// Events can be appended concurrently from several threads through a shared
/// reference.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for event in other {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.method.as_deref() == Some(method))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of distinct methods with transformation events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.method.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Iterator over the events of an [`EventLog`].
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Number of methods that had any transformations.
    pub methods_transformed: usize,
    /// Number of box sites eliminated.
    pub boxings_eliminated: usize,
    /// Number of instructions removed.
    pub instructions_removed: usize,
    /// Number of null checks removed.
    pub null_checks_removed: usize,
    /// Number of branches simplified.
    pub branches_simplified: usize,
    /// Number of iterator accessors specialized.
    pub iterators_specialized: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Number of pipeline iterations.
    pub iterations: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            methods_transformed: log.methods_affected(),
            boxings_eliminated: get(EventKind::BoxingEliminated),
            instructions_removed: get(EventKind::InstructionRemoved),
            null_checks_removed: get(EventKind::NullCheckRemoved),
            branches_simplified: get(EventKind::BranchSimplified),
            iterators_specialized: get(EventKind::IteratorSpecialized),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            iterations: 0,
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Sets the number of iterations.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = [
            (self.methods_transformed, "methods"),
            (self.boxings_eliminated, "boxings eliminated"),
            (self.iterators_specialized, "iterators specialized"),
            (self.null_checks_removed, "null checks removed"),
            (self.branches_simplified, "branches simplified"),
            (self.instructions_removed, "instructions removed"),
            (self.errors, "errors"),
            (self.warnings, "warnings"),
        ];
        let parts: Vec<String> = counters
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();

        let stats = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };

        if self.total_time.as_millis() > 0 {
            format!(
                "{} in {:?} ({} iterations)",
                stats, self.total_time, self.iterations
            )
        } else {
            stats
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.summary(), "no events");
        assert!(!log.has(EventKind::BoxingEliminated));
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();
        log.record(EventKind::NullCheckRemoved)
            .at("check", 4)
            .pass("RedundantNullCheck");

        let event = log.iter().next().unwrap();
        assert_eq!(event.method.as_deref(), Some("check"));
        assert_eq!(event.location, Some(4));
        assert_eq!(event.message, "null check removed");
        assert_eq!(event.pass.as_deref(), Some("RedundantNullCheck"));
        assert_eq!(event.to_string(), "[null check removed] check@4: null check removed");
    }

    #[test]
    fn test_kind_descriptions_are_distinct() {
        let descriptions: HashSet<_> = EventKind::iter().map(|kind| kind.description()).collect();
        assert_eq!(descriptions.len(), EventKind::iter().count());
        assert_eq!(EventKind::iter().filter(EventKind::is_transformation).count(), 5);
    }

    #[test]
    fn test_merge_and_filters() {
        let first = EventLog::new();
        let second = EventLog::new();
        first.record(EventKind::BoxingEliminated).at("a", 1);
        second.record(EventKind::InstructionRemoved).at("b", 2);
        second.warn("odd");

        first.merge(&second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.filter_method("b").count(), 1);
        assert_eq!(first.transformations().count(), 2);
        assert_eq!(first.filter_kind(EventKind::Warning).count(), 1);
        assert_eq!(first.methods_affected(), 2);
    }

    #[test]
    fn test_derived_stats() {
        let log = EventLog::new();
        log.record(EventKind::BoxingEliminated).at("m", 0);
        log.record(EventKind::InstructionRemoved).at("m", 0);
        log.record(EventKind::InstructionRemoved).at("m", 2);
        log.record(EventKind::PassCompleted).method("m");
        log.record(EventKind::Error).method("m").message("broken");

        let stats = DerivedStats::from_log(&log).with_iterations(2);
        assert_eq!(stats.methods_transformed, 1);
        assert_eq!(stats.boxings_eliminated, 1);
        assert_eq!(stats.instructions_removed, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(
            stats.summary(),
            "1 methods, 1 boxings eliminated, 2 instructions removed, 1 errors"
        );
    }

    #[test]
    fn test_thread_safe_append() {
        use std::{sync::Arc, thread};

        let log = Arc::new(EventLog::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for j in 0..50 {
                        log.record(EventKind::InstructionRemoved)
                            .at(format!("m{i}"), j);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 200);
        assert_eq!(log.clone().len(), 200);
    }
}
