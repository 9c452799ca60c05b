//! Error types
//!
//! The producer has no recoverable error values of its own: an action or
//! selector that panics propagates to whichever call invoked it, and
//! unsubscribing twice or disconnecting twice are documented no-ops. The one
//! recoverable condition is awaiting a [`Wait`](crate::Wait) future whose
//! producer was destroyed before the selection ever changed.

use thiserror::Error;

/// Error returned when a [`Wait`](crate::Wait) future can no longer resolve.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The producer was destroyed before the awaited selection changed.
    #[error("producer was destroyed before the awaited selection changed")]
    ProducerDestroyed,
}
