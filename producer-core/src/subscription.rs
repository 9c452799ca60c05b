//! Subscription handles
//!
//! Subscribing to a producer hands back an opaque handle; the registry entry
//! itself stays owned by the producer. Three handle shapes exist:
//!
//! - [`Unsubscribe`]: bare detach handle returned by `subscribe`/`once`
//! - [`Connection`]: event-signal style handle with a `connected` flag,
//!   returned by `connect`/`connect_once`
//! - [`Wait`]: a future resolving with the first changed selection,
//!   returned by `wait`
//!
//! All of them are safe to use after the producer was destroyed; detaching
//! twice is a no-op.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::WaitError;

/// Handle that removes a subscription from its producer's registry.
///
/// Cloneable; all clones detach the same entry. Calling
/// [`unsubscribe`](Self::unsubscribe) more than once, or after the producer
/// was destroyed, is a no-op.
#[derive(Clone)]
pub struct Unsubscribe {
    detach: Rc<dyn Fn()>,
}

impl Unsubscribe {
    pub(crate) fn new(detach: impl Fn() + 'static) -> Self {
        Self {
            detach: Rc::new(detach),
        }
    }

    /// Remove the subscription. Idempotent.
    pub fn unsubscribe(&self) {
        (self.detach)();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").finish_non_exhaustive()
    }
}

/// Event-signal style subscription handle.
///
/// Mirrors the connection objects of classic event APIs: it carries a
/// readable `connected` flag and a [`disconnect`](Self::disconnect) method
/// as the flag's sole mutator. Disconnecting twice is safe.
#[derive(Clone)]
pub struct Connection {
    connected: Rc<Cell<bool>>,
    unsubscribe: Unsubscribe,
}

impl Connection {
    pub(crate) fn new(unsubscribe: Unsubscribe) -> Self {
        Self {
            connected: Rc::new(Cell::new(true)),
            unsubscribe,
        }
    }

    /// Whether the connection is still attached.
    ///
    /// The flag only tracks calls to [`disconnect`](Self::disconnect); a
    /// one-shot connection that already delivered, or a destroyed producer,
    /// leaves it `true` even though no further notification can arrive.
    pub fn connected(&self) -> bool {
        self.connected.get()
    }

    /// Detach the underlying subscription and clear the flag. Idempotent.
    pub fn disconnect(&self) {
        if self.connected.replace(false) {
            self.unsubscribe.unsubscribe();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.connected.get())
            .finish()
    }
}

/// Future returned by [`Producer::wait`](crate::Producer::wait).
///
/// Resolves with the first selection value that differs from the one
/// computed at registration time. Dropping the future before it resolves
/// cancels the wait and detaches its registry entry, so an abandoned wait
/// never leaks a subscription. If the producer is destroyed first, the
/// future resolves with [`WaitError::ProducerDestroyed`].
#[derive(Debug)]
pub struct Wait<T> {
    rx: oneshot::Receiver<T>,
    unsubscribe: Unsubscribe,
}

impl<T> Wait<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>, unsubscribe: Unsubscribe) -> Self {
        Self { rx, unsubscribe }
    }

    /// Cancel the wait without awaiting it.
    ///
    /// Equivalent to dropping the future; provided for call sites where the
    /// intent deserves a name.
    pub fn cancel(self) {}
}

impl<T> Future for Wait<T> {
    type Output = Result<T, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| WaitError::ProducerDestroyed))
    }
}

impl<T> Drop for Wait<T> {
    fn drop(&mut self) {
        self.unsubscribe.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let unsub = Unsubscribe::new(move || c.set(c.get() + 1));

        unsub.unsubscribe();
        unsub.unsubscribe();
        unsub.clone().unsubscribe();

        // The closure itself runs every time; idempotency of the removal is
        // the registry's job and is covered by the producer tests.
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn connection_disconnects_once() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let conn = Connection::new(Unsubscribe::new(move || c.set(c.get() + 1)));

        assert!(conn.connected());
        conn.disconnect();
        assert!(!conn.connected());
        conn.disconnect();
        conn.disconnect();

        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn wait_resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel();
        let wait = Wait::new(rx, Unsubscribe::new(|| {}));

        tx.send(7u32).unwrap();
        assert_eq!(wait.await, Ok(7));
    }

    #[tokio::test]
    async fn wait_errors_when_sender_dropped() {
        let (tx, rx) = oneshot::channel::<u32>();
        let wait = Wait::new(rx, Unsubscribe::new(|| {}));

        drop(tx);
        assert_eq!(wait.await, Err(WaitError::ProducerDestroyed));
    }

    #[test]
    fn dropping_wait_detaches_subscription() {
        let detached = Rc::new(Cell::new(false));
        let d = detached.clone();
        let (_tx, rx) = oneshot::channel::<u32>();
        let wait = Wait::new(rx, Unsubscribe::new(move || d.set(true)));

        drop(wait);
        assert!(detached.get());
    }
}
