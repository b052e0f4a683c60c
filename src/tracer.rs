//! Render tracing infrastructure.
//!
//! Modeled on the teacher's `VmTracer` family (`tracer.rs`): a trait with hook
//! points at the render loop's key events, monomorphized away entirely when
//! [`NoopTracer`] is used, and swappable for a logging or recording
//! implementation when `Options::debug` is set.

use std::fmt;

/// A single traced render event, used by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub enum TraceEvent {
    EnterBlock { depth: usize },
    ExitBlock { depth: usize },
    EnterTag { name: String, depth: usize },
    ExitTag { name: String, depth: usize },
    /// A variable or attribute lookup missed and fell back to the default value.
    Missing { what: String },
    FilterApplied { name: String },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::EnterBlock { depth } => write!(f, "{}> block", "  ".repeat(*depth)),
            TraceEvent::ExitBlock { depth } => write!(f, "{}< block", "  ".repeat(*depth)),
            TraceEvent::EnterTag { name, depth } => write!(f, "{}> {{% {name} %}}", "  ".repeat(*depth)),
            TraceEvent::ExitTag { name, depth } => write!(f, "{}< {{% {name} %}}", "  ".repeat(*depth)),
            TraceEvent::Missing { what } => write!(f, "  missing: {what}"),
            TraceEvent::FilterApplied { name } => write!(f, "  |{name}"),
        }
    }
}

/// Hook points fired by the render loop of every dialect.
///
/// Default bodies do nothing, so implementers only need to override the
/// events they care about.
pub trait RenderTracer {
    fn enter_block(&mut self, _depth: usize) {}
    fn exit_block(&mut self, _depth: usize) {}
    fn enter_tag(&mut self, _name: &str, _depth: usize) {}
    fn exit_tag(&mut self, _name: &str, _depth: usize) {}
    fn missing(&mut self, _what: &str) {}
    fn filter_applied(&mut self, _name: &str) {}

    /// Polled by the render loop before each top-level child of a block
    /// (spec §5, "Cancellation"). Default never cancels; a caller that wants
    /// to interrupt a long render implements this over a shared flag (e.g.
    /// an `Rc<Cell<bool>>` or `Arc<AtomicBool>`) instead of a timeout, since
    /// rendering itself is synchronous and has no natural suspension point.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Zero-cost default: every call compiles away under monomorphization.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl RenderTracer for NoopTracer {}

/// Writes a human-readable trace to stderr as rendering proceeds.
///
/// Backs `Options::debug`.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl RenderTracer for StderrTracer {
    fn enter_tag(&mut self, name: &str, depth: usize) {
        eprintln!("{}", TraceEvent::EnterTag { name: name.to_owned(), depth });
    }

    fn missing(&mut self, what: &str) {
        eprintln!("{}", TraceEvent::Missing { what: what.to_owned() });
    }
}

/// Records every event for later inspection — used by the `{% debug %}` tag
/// and by tests that assert on render order.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderTracer for RecordingTracer {
    fn enter_block(&mut self, depth: usize) {
        self.events.push(TraceEvent::EnterBlock { depth });
    }

    fn exit_block(&mut self, depth: usize) {
        self.events.push(TraceEvent::ExitBlock { depth });
    }

    fn enter_tag(&mut self, name: &str, depth: usize) {
        self.events.push(TraceEvent::EnterTag { name: name.to_owned(), depth });
    }

    fn exit_tag(&mut self, name: &str, depth: usize) {
        self.events.push(TraceEvent::ExitTag { name: name.to_owned(), depth });
    }

    fn missing(&mut self, what: &str) {
        self.events.push(TraceEvent::Missing { what: what.to_owned() });
    }

    fn filter_applied(&mut self, name: &str) {
        self.events.push(TraceEvent::FilterApplied { name: name.to_owned() });
    }
}

/// A tracer that only answers `is_cancelled`, backed by a shared flag a
/// caller can flip from another thread — the one piece of concurrency the
/// synchronous render loop exposes a hook for (spec §5).
#[derive(Debug, Clone, Default)]
pub struct CancelTracer {
    flag: std::rc::Rc<std::cell::Cell<bool>>,
}

impl CancelTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> CancelHandle {
        CancelHandle { flag: self.flag.clone() }
    }
}

impl RenderTracer for CancelTracer {
    fn is_cancelled(&self) -> bool {
        self.flag.get()
    }
}

/// A cloneable handle that cancels the render its `CancelTracer` was handed
/// to. `Rc`-based, so it only crosses threads when wrapped in something
/// `Send` (e.g. swap in `Arc<AtomicBool>` for a multi-threaded embedder) —
/// `weave` itself stays single-threaded-per-render per spec §5.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: std::rc::Rc<std::cell::Cell<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_tracer_reports_cancellation_through_its_handle() {
        let tracer = CancelTracer::new();
        let handle = tracer.handle();
        assert!(!tracer.is_cancelled());
        handle.cancel();
        assert!(tracer.is_cancelled());
    }

    #[test]
    fn recording_tracer_captures_events_in_order() {
        let mut tracer = RecordingTracer::new();
        tracer.enter_tag("if", 0);
        tracer.missing("name");
        tracer.exit_tag("if", 0);
        assert_eq!(tracer.events.len(), 3);
    }
}
