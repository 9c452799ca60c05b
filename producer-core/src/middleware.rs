//! Dispatch middleware
//!
//! Middleware intercepts actions on their way through
//! [`Producer::dispatch`](crate::Producer::dispatch): `before` hooks run in
//! registration order ahead of the action function, `after` hooks run in
//! reverse order once the new state is committed, with the change indicator.
//!
//! This is the hook point for cross-cutting concerns (logging, action
//! recording, metrics) without touching the action functions themselves.
//!
//! # Example
//!
//! ```ignore
//! let producer = Producer::new(CounterState::default(), reducer);
//! producer.add_middleware(LoggingMiddleware::new());
//!
//! let log = ActionLog::with_capacity(100);
//! producer.add_middleware(log.clone());
//!
//! producer.dispatch(CounterAction::Increment { by: 1 });
//! assert_eq!(log.recent(1)[0].name, "Increment");
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use serde::Serialize;

use crate::action::Action;

/// Middleware trait for intercepting dispatched actions
///
/// Implement this trait to add logging, recording, or other cross-cutting
/// concerns to a producer.
pub trait Middleware<A: Action> {
    /// Called before the action function runs
    fn before(&mut self, action: &A);

    /// Called after the new state is committed
    fn after(&mut self, action: &A, state_changed: bool);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl<A: Action> Middleware<A> for NoopMiddleware {
    fn before(&mut self, _action: &A) {}
    fn after(&mut self, _action: &A, _state_changed: bool) {}
}

/// Middleware that logs actions through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl<A: Action> Middleware<A> for LoggingMiddleware {
    fn before(&mut self, action: &A) {
        if self.log_before {
            tracing::debug!(action = %action.name(), "dispatching action");
        }
    }

    fn after(&mut self, action: &A, state_changed: bool) {
        if self.log_after {
            tracing::debug!(
                action = %action.name(),
                state_changed = state_changed,
                "action processed"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
///
/// `before` hooks run in insertion order, `after` hooks in reverse order for
/// proper nesting. This is also the chain a producer owns internally; see
/// [`Producer::add_middleware`](crate::Producer::add_middleware).
pub struct ComposedMiddleware<A: Action> {
    middlewares: Vec<Box<dyn Middleware<A>>>,
}

impl<A: Action> std::fmt::Debug for ComposedMiddleware<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<A: Action> Default for ComposedMiddleware<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> ComposedMiddleware<A> {
    /// Create a new composed middleware
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware<A> + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Number of composed middleware
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the composition is empty
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl<A: Action> Middleware<A> for ComposedMiddleware<A> {
    fn before(&mut self, action: &A) {
        for middleware in &mut self.middlewares {
            middleware.before(action);
        }
    }

    fn after(&mut self, action: &A, state_changed: bool) {
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(action, state_changed);
        }
    }
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

/// An entry in the action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    /// Action name (from `Action::name()`)
    pub name: &'static str,
    /// Debug rendering of the action, arguments included
    pub summary: String,
    /// Timestamp when the action was logged
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
    /// Whether the action changed the state
    pub state_changed: bool,
}

/// Serializable view of a log entry, for snapshot export
#[derive(Debug, Clone, Serialize)]
struct ActionLogExport<'a> {
    name: &'a str,
    summary: &'a str,
    sequence: u64,
    state_changed: bool,
    age_ms: u128,
}

/// Middleware that records recent actions in a ring buffer.
///
/// Cloning the log shares the underlying buffer, so a clone can be handed to
/// [`Producer::add_middleware`](crate::Producer::add_middleware) while the
/// original stays around for inspection.
///
/// Name patterns in `exclude` are glob-style (`*` and `?`) and suppress
/// matching actions, which keeps high-frequency noise like ticks out of the
/// buffer.
#[derive(Clone)]
pub struct ActionLog {
    entries: Rc<RefCell<VecDeque<ActionLogEntry>>>,
    exclude: Rc<Vec<String>>,
    capacity: usize,
    sequence: Rc<Cell<u64>>,
}

impl ActionLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_excludes(capacity, Vec::new())
    }

    /// Create a log that skips actions whose name matches any glob pattern.
    pub fn with_excludes(capacity: usize, exclude: Vec<String>) -> Self {
        Self {
            entries: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
            exclude: Rc::new(exclude),
            capacity,
            sequence: Rc::new(Cell::new(0)),
        }
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<ActionLogEntry> {
        let entries = self.entries.borrow();
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Total entries currently held.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Export the buffer as a JSON array, oldest first.
    pub fn to_json(&self) -> serde_json::Value {
        let entries = self.entries.borrow();
        let exported: Vec<ActionLogExport<'_>> = entries
            .iter()
            .map(|e| ActionLogExport {
                name: e.name,
                summary: &e.summary,
                sequence: e.sequence,
                state_changed: e.state_changed,
                age_ms: e.timestamp.elapsed().as_millis(),
            })
            .collect();
        serde_json::to_value(exported).unwrap_or(serde_json::Value::Null)
    }

    fn should_log(&self, name: &str) -> bool {
        !self.exclude.iter().any(|p| glob_match(p, name))
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<A: Action> Middleware<A> for ActionLog {
    fn before(&mut self, _action: &A) {}

    fn after(&mut self, action: &A, state_changed: bool) {
        let name = action.name();
        if self.capacity == 0 || !self.should_log(name) {
            return;
        }

        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);

        let mut entries = self.entries.borrow_mut();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActionLogEntry {
            name,
            summary: format!("{action:?}"),
            timestamp: Instant::now(),
            sequence,
            state_changed,
        });
    }
}

/// Match a name against a glob pattern supporting `*` and `?`.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn matches(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&p[1..], n) || (!n.is_empty() && matches(p, &n[1..]))
            }
            (Some('?'), Some(_)) => matches(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => matches(&p[1..], &n[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    matches(&p, &n)
}
