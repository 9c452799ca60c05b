//! Core types for the producer state container
//!
//! This crate provides a minimal reactive state container: a single state
//! value mutated through dispatched actions, with batched, deduplicated
//! change notification to subscribers.
//!
//! # Core Concepts
//!
//! - **Action**: Events that describe state changes
//! - **Producer**: The state container itself: dispatch, flush, subscribe
//! - **Scheduler**: Where deferred flushes run (tokio task or manual tick)
//! - **Subscription handles**: Unsubscribe tokens, signal-style connections,
//!   and awaitable waits
//!
//! # Basic Example
//!
//! ```ignore
//! use producer_core::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct AppState {
//!     counter: i32,
//! }
//!
//! #[derive(Action, Clone, Debug)]
//! #[action(state = "AppState", dispatchers)]
//! enum AppAction {
//!     Increment { by: i32 },
//! }
//!
//! fn reducer(state: &AppState, action: AppAction) -> AppState {
//!     match action {
//!         AppAction::Increment { by } => AppState { counter: state.counter + by },
//!     }
//! }
//!
//! let producer = Producer::new(AppState { counter: 0 }, reducer);
//! producer.subscribe(|state, prev| {
//!     println!("counter: {} (was {})", state.counter, prev.counter);
//! });
//! producer.increment(1);
//! ```
//!
//! # Batching
//!
//! Dispatches commit synchronously, but notification is deferred: the first
//! state-changing dispatch schedules a flush on the producer's scheduler,
//! and every further dispatch before that flush runs coalesces into it.
//! Subscribers therefore see one `(state, prev_state)` pair per flush, not
//! one per dispatch, and a state that changes and changes back between
//! flushes produces no notification at all.

pub mod action;
pub mod error;
pub mod middleware;
pub mod producer;
pub mod scheduler;
pub mod subscription;
pub mod testing;

// Core trait exports
pub use action::{Action, Reducer};
pub use error::WaitError;

// Producer exports
pub use producer::{Dispatchers, Producer};

// Scheduler exports
pub use scheduler::{DeferHandle, ManualScheduler, Scheduler, TokioScheduler};

// Subscription handle exports
pub use subscription::{Connection, Unsubscribe, Wait};

// Middleware exports
pub use middleware::{
    ActionLog, ActionLogEntry, ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware,
};

// Testing exports
pub use testing::Recorder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, Reducer};
    pub use crate::error::WaitError;
    pub use crate::middleware::{
        ActionLog, ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware,
    };
    pub use crate::producer::{Dispatchers, Producer};
    pub use crate::scheduler::{DeferHandle, ManualScheduler, Scheduler, TokioScheduler};
    pub use crate::subscription::{Connection, Unsubscribe, Wait};
}
