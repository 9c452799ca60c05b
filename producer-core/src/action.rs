//! Action trait for type-safe state mutations

use std::fmt::Debug;

/// Marker trait for actions that can be dispatched to a producer
///
/// Actions are plain data values that name a mutation and carry its
/// arguments. They should be:
/// - Clone: Actions may be logged, inspected by middleware, or replayed
/// - Debug: For debugging and logging
///
/// Use `#[derive(Action)]` from `producer-macros` to auto-implement this
/// trait, along with an optional dispatcher trait exposing one typed method
/// per action variant.
pub trait Action: Clone + Debug + 'static {
    /// Get the action name for logging and filtering
    fn name(&self) -> &'static str;
}

/// A pure action function mapping the previous state and an action to the
/// next state.
///
/// Called synchronously, exactly once per dispatch, with the state current
/// at call time. It must not mutate anything; it computes and returns a
/// replacement value. A panic inside the reducer propagates to the dispatch
/// caller and leaves the producer's state untouched.
pub type Reducer<S, A> = fn(&S, A) -> S;
