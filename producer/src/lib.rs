//! producer: Minimal reactive state container
//!
//! A single state value, mutated through dispatched actions, with batched
//! and deduplicated change notification to subscribers. Dispatches commit
//! synchronously; subscribers hear about the net change once per flush.
//!
//! # Example
//! ```ignore
//! use producer::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct CounterState {
//!     count: i32,
//! }
//!
//! #[derive(Action, Clone, Debug)]
//! #[action(state = "CounterState", dispatchers)]
//! enum CounterAction {
//!     Increment { by: i32 },
//!     Reset,
//! }
//!
//! fn reducer(state: &CounterState, action: CounterAction) -> CounterState {
//!     match action {
//!         CounterAction::Increment { by } => CounterState { count: state.count + by },
//!         CounterAction::Reset => CounterState { count: 0 },
//!     }
//! }
//!
//! let producer = Producer::new(CounterState { count: 0 }, reducer);
//! producer.subscribe(|state, prev| {
//!     println!("count: {} (was {})", state.count, prev.count);
//! });
//! producer.increment(5);
//! ```

// Re-export everything from core
pub use producer_core::*;

// Re-export derive macros
pub use producer_macros::Action;

/// Prelude for convenient imports
pub mod prelude {
    // Traits and core types
    pub use producer_core::{Action, Dispatchers, Producer, Reducer, WaitError};

    // Schedulers
    pub use producer_core::{DeferHandle, ManualScheduler, Scheduler, TokioScheduler};

    // Subscription handles
    pub use producer_core::{Connection, Unsubscribe, Wait};

    // Middleware
    pub use producer_core::{
        ActionLog, ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware,
    };

    // Derive macros
    pub use producer_macros::Action;
}
