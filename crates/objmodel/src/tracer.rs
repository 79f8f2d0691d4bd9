//! Dispatch tracing infrastructure.
//!
//! Provides a trait-based tracing system for the runtime. Every hook has a default
//! no-op implementation, so [`NoopTracer`] costs nothing beyond a virtual call.
//!
//! # Architecture
//!
//! The [`DispatchTracer`] trait defines hook points at key events (class definition,
//! construction, method entry/exit, parent delegation, class attribute writes).
//! Concrete implementations collect different kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable dispatch log to stderr |
//! | [`ProfilingTracer`] | Per-method call counts and depth tracking |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |
//!
//! # Usage
//!
//! ```ignore
//! let mut rt = Runtime::new(NoLimitTracker).with_tracer(StderrTracer::new());
//! // ... define, construct, invoke ...
//! ```

use std::{
    any::Any,
    collections::HashMap,
    fmt,
};

use crate::function::MethodKind;

/// Trace event captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A class was registered.
    DefineClass {
        name: String,
        /// Number of ancestors.
        depth: usize,
    },
    /// An instance was allocated (before its initializer runs).
    Construct { class: String },
    /// A method body was entered.
    Call {
        /// Class the dispatch started from.
        class: String,
        method: String,
        kind: MethodKind,
        /// Dispatch depth after entering.
        depth: usize,
    },
    /// A method body returned (successfully or not).
    Return { depth: usize },
    /// A body delegated to its parent's implementation.
    Super {
        /// Class defining the delegating body.
        from: String,
        method: String,
    },
    /// A class attribute was written.
    ClassAttrWrite { class: String, name: String },
    /// An instance was released.
    Release { class: String },
}

/// Trait for runtime dispatch tracing.
///
/// All methods have default no-op implementations. Implementations only override the
/// hooks they care about. `as_any` lets hosts get the concrete tracer back from the
/// runtime after a run (see [`Runtime::tracer_as`](crate::Runtime::tracer_as)).
pub trait DispatchTracer: fmt::Debug + Send + Any {
    /// Called after a class is registered.
    #[inline(always)]
    fn on_define_class(&mut self, _name: &str, _depth: usize) {}

    /// Called after an instance is allocated, before its initializer runs.
    #[inline(always)]
    fn on_construct(&mut self, _class: &str) {}

    /// Called when a method body is entered.
    ///
    /// # Arguments
    /// * `class` - Name of the class dispatch started from
    /// * `method` - Method name
    /// * `kind` - How the method is bound
    /// * `depth` - Dispatch depth after entering
    #[inline(always)]
    fn on_call(&mut self, _class: &str, _method: &str, _kind: MethodKind, _depth: usize) {}

    /// Called when a method body returns.
    ///
    /// # Arguments
    /// * `depth` - Dispatch depth after leaving
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called when a body delegates to the implementation above its defining class.
    #[inline(always)]
    fn on_super(&mut self, _from: &str, _method: &str) {}

    /// Called after a class attribute is written.
    #[inline(always)]
    fn on_class_attr_write(&mut self, _class: &str, _name: &str) {}

    /// Called after an instance is released.
    #[inline(always)]
    fn on_release(&mut self, _class: &str) {}

    /// Upcast used to downcast back to the concrete tracer.
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// NoopTracer: default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl DispatchTracer for NoopTracer {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// StderrTracer: human-readable dispatch log
// ============================================================================

/// Tracer that prints a human-readable dispatch log to stderr.
///
/// Output format:
/// ```text
///   +++ CLASS BankAccount        depth=0
///   *** NEW   BankAccount
///   >>> CALL  BankAccount.__init__ (Instance) depth=1
///   <<< RETURN                   depth=0
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines to print (prevents runaway output). None = unlimited.
    limit: Option<usize>,
    /// Number of lines printed so far.
    count: usize,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no line limit.
    #[must_use]
    pub fn new() -> Self {
        Self { limit: None, count: 0 }
    }

    /// Creates a new stderr tracer that stops after `limit` lines.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    fn emit(&mut self, line: fmt::Arguments<'_>) {
        match self.limit {
            Some(limit) if self.count > limit => return,
            Some(limit) if self.count == limit => {
                eprintln!("--- trace limit reached ({limit} lines) ---");
            }
            _ => eprintln!("{line}"),
        }
        self.count += 1;
    }
}

impl DispatchTracer for StderrTracer {
    fn on_define_class(&mut self, name: &str, depth: usize) {
        self.emit(format_args!("  +++ CLASS {name:<20} depth={depth}"));
    }

    fn on_construct(&mut self, class: &str) {
        self.emit(format_args!("  *** NEW   {class}"));
    }

    fn on_call(&mut self, class: &str, method: &str, kind: MethodKind, depth: usize) {
        self.emit(format_args!("  >>> CALL  {class}.{method} ({kind}) depth={depth}"));
    }

    fn on_return(&mut self, depth: usize) {
        self.emit(format_args!("  <<< RETURN                   depth={depth}"));
    }

    fn on_super(&mut self, from: &str, method: &str) {
        self.emit(format_args!("  ^^^ SUPER {from}.{method}"));
    }

    fn on_class_attr_write(&mut self, class: &str, name: &str) {
        self.emit(format_args!("  ... SET   {class}.{name}"));
    }

    fn on_release(&mut self, class: &str) {
        self.emit(format_args!("  --- FREE  {class}"));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// ProfilingTracer: call counts and depth tracking
// ============================================================================

/// Tracer that collects dispatch statistics.
///
/// Tracks per-method call counts (keyed `Class.method`, by the class dispatch started
/// from), total calls, constructions, parent delegations and maximum depth.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    call_counts: HashMap<String, u64>,
    total_calls: u64,
    constructions: u64,
    super_calls: u64,
    max_depth: usize,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingReport {
    /// Per-method call counts, sorted by frequency (highest first), then by name.
    pub call_counts: Vec<(String, u64)>,
    pub total_calls: u64,
    pub constructions: u64,
    pub super_calls: u64,
    /// Maximum dispatch depth observed.
    pub max_depth: usize,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a report from the collected data.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        let mut call_counts: Vec<_> = self.call_counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
        call_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ProfilingReport {
            call_counts,
            total_calls: self.total_calls,
            constructions: self.constructions,
            super_calls: self.super_calls,
            max_depth: self.max_depth,
        }
    }
}

impl DispatchTracer for ProfilingTracer {
    fn on_construct(&mut self, _class: &str) {
        self.constructions += 1;
    }

    fn on_call(&mut self, class: &str, method: &str, _kind: MethodKind, depth: usize) {
        *self.call_counts.entry(format!("{class}.{method}")).or_insert(0) += 1;
        self.total_calls += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn on_super(&mut self, _from: &str, _method: &str) {
        self.super_calls += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dispatch Profiling Report ===")?;
        writeln!(f, "Total calls:        {}", self.total_calls)?;
        writeln!(f, "Constructions:      {}", self.constructions)?;
        writeln!(f, "Parent delegations: {}", self.super_calls)?;
        writeln!(f, "Max call depth:     {}", self.max_depth)?;
        writeln!(f)?;
        writeln!(f, "--- Method Frequency ---")?;
        for (method, count) in &self.call_counts {
            let pct = (*count as f64 / self.total_calls as f64) * 100.0;
            writeln!(f, "  {method:<32} {count:>8}  ({pct:>5.1}%)")?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer: full event recording
// ============================================================================

/// Tracer that records all events.
///
/// The most expensive tracer (allocates per event); use it for debugging specific
/// issues or in tests that assert on dispatch order.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|limit| self.events.len() < limit) {
            self.events.push(event);
        }
    }
}

impl DispatchTracer for RecordingTracer {
    fn on_define_class(&mut self, name: &str, depth: usize) {
        self.record(TraceEvent::DefineClass {
            name: name.to_owned(),
            depth,
        });
    }

    fn on_construct(&mut self, class: &str) {
        self.record(TraceEvent::Construct { class: class.to_owned() });
    }

    fn on_call(&mut self, class: &str, method: &str, kind: MethodKind, depth: usize) {
        self.record(TraceEvent::Call {
            class: class.to_owned(),
            method: method.to_owned(),
            kind,
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_super(&mut self, from: &str, method: &str) {
        self.record(TraceEvent::Super {
            from: from.to_owned(),
            method: method.to_owned(),
        });
    }

    fn on_class_attr_write(&mut self, class: &str, name: &str) {
        self.record(TraceEvent::ClassAttrWrite {
            class: class.to_owned(),
            name: name.to_owned(),
        });
    }

    fn on_release(&mut self, class: &str) {
        self.record(TraceEvent::Release { class: class.to_owned() });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiling_report_sorts_by_frequency() {
        let mut tracer = ProfilingTracer::new();
        tracer.on_call("A", "x", MethodKind::Instance, 1);
        tracer.on_call("A", "y", MethodKind::Instance, 2);
        tracer.on_call("A", "y", MethodKind::Instance, 1);
        tracer.on_construct("A");

        let report = tracer.report();
        assert_eq!(report.call_counts, vec![("A.y".to_owned(), 2), ("A.x".to_owned(), 1)]);
        assert_eq!(report.total_calls, 3);
        assert_eq!(report.constructions, 1);
        assert_eq!(report.max_depth, 2);
        assert!(report.to_string().contains("A.y"));
    }

    #[test]
    fn recording_tracer_respects_limit() {
        let mut tracer = RecordingTracer::with_limit(2);
        tracer.on_construct("A");
        tracer.on_return(0);
        tracer.on_release("A");
        assert_eq!(
            tracer.events(),
            &[TraceEvent::Construct { class: "A".to_owned() }, TraceEvent::Return { depth: 0 }]
        );
    }
}
