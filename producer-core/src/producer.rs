//! Reactive state producer
//!
//! A [`Producer`] holds a single immutable state value, mutates it through
//! dispatched actions, and notifies subscribers of changes in batched,
//! deduplicated fashion:
//!
//! - **Dispatch** runs the pure action function against the current state
//!   and commits the result.
//! - **Flush** is deferred to the host's next idle tick, so arbitrarily many
//!   synchronous dispatches produce exactly one notification pass.
//! - **Subscriptions** observe either the whole state or a selector-derived
//!   value, with equality-based change detection.
//!
//! The producer is a single-threaded type: handles clone cheaply and share
//! one state cell, and all operations run on the owning thread.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Clone, Debug, PartialEq)]
//! struct CounterState { count: i32 }
//!
//! #[derive(Action, Clone, Debug)]
//! #[action(state = "CounterState", dispatchers)]
//! enum CounterAction {
//!     Increment { by: i32 },
//! }
//!
//! fn reducer(state: &CounterState, action: CounterAction) -> CounterState {
//!     match action {
//!         CounterAction::Increment { by } => CounterState { count: state.count + by },
//!     }
//! }
//!
//! let producer = Producer::new(CounterState { count: 0 }, reducer);
//! producer.subscribe(|state, prev| {
//!     println!("count: {} (was {})", state.count, prev.count);
//! });
//!
//! producer.increment(5);
//! producer.increment(3);
//! // After the deferred flush runs, the subscriber fires once with 8 / 0.
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::action::{Action, Reducer};
use crate::middleware::{ComposedMiddleware, Middleware};
use crate::scheduler::{DeferHandle, Scheduler, TokioScheduler};
use crate::subscription::{Connection, Unsubscribe, Wait};

/// A registered notify callback plus its liveness flag.
///
/// The flag lets a flush pass skip entries that were unsubscribed while the
/// pass held its own clone of the registry.
struct Subscriber<S> {
    active: Cell<bool>,
    notify: RefCell<Box<dyn FnMut(&S, &S)>>,
}

struct ProducerInner<S, A: Action> {
    state: RefCell<S>,
    /// State as of the last completed flush; the `prev` side of
    /// notifications.
    state_since_flush: RefCell<S>,
    reducer: Reducer<S, A>,
    scheduler: Rc<dyn Scheduler>,
    /// At most one deferred flush is outstanding at any time.
    pending_flush: RefCell<Option<DeferHandle>>,
    next_subscription_id: Cell<u64>,
    /// Keyed by a monotonically increasing id, so iteration follows
    /// registration order.
    subscribers: RefCell<BTreeMap<u64, Rc<Subscriber<S>>>>,
    middleware: RefCell<ComposedMiddleware<A>>,
}

/// Reactive state container with batched change notification.
///
/// See the [module docs](self) for an overview. Cloning a `Producer` yields
/// another handle to the same state cell, scheduler slot, and subscription
/// registry.
pub struct Producer<S, A: Action> {
    inner: Rc<ProducerInner<S, A>>,
}

impl<S, A: Action> Clone for Producer<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, A: Action> std::fmt::Debug for Producer<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field(
                "flush_pending",
                &self.inner.pending_flush.borrow().is_some(),
            )
            .finish()
    }
}

impl<S, A> Producer<S, A>
where
    S: Clone + PartialEq + 'static,
    A: Action,
{
    /// Create a producer deferring flushes onto the current tokio
    /// [`LocalSet`](tokio::task::LocalSet).
    ///
    /// Hosts with their own frame/tick loop should prefer
    /// [`with_scheduler`](Self::with_scheduler) and a
    /// [`ManualScheduler`](crate::ManualScheduler).
    pub fn new(initial: S, reducer: Reducer<S, A>) -> Self {
        Self::with_scheduler(initial, reducer, TokioScheduler)
    }

    /// Create a producer with an injected flush scheduler.
    pub fn with_scheduler(
        initial: S,
        reducer: Reducer<S, A>,
        scheduler: impl Scheduler + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ProducerInner {
                state: RefCell::new(initial.clone()),
                state_since_flush: RefCell::new(initial),
                reducer,
                scheduler: Rc::new(scheduler),
                pending_flush: RefCell::new(None),
                next_subscription_id: Cell::new(0),
                subscribers: RefCell::new(BTreeMap::new()),
                middleware: RefCell::new(ComposedMiddleware::new()),
            }),
        }
    }

    /// Clone of the current state.
    pub fn state(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Pure projection of the current state. No subscription is created.
    pub fn select<T>(&self, selector: impl FnOnce(&S) -> T) -> T {
        selector(&self.inner.state.borrow())
    }

    /// Replace the state wholesale, bypassing the action functions.
    ///
    /// Ownership of `state` moves into the cell, so the caller cannot alias
    /// the committed value afterward. Unlike [`dispatch`](Self::dispatch),
    /// this schedules a flush even when the new value compares equal to the
    /// old one. Callers are trusted to pass genuinely new state, and the
    /// flush itself still deduplicates the notification.
    pub fn set_state(&self, state: S) -> S {
        *self.inner.state.borrow_mut() = state;
        if self.inner.pending_flush.borrow().is_none() {
            self.schedule_flush();
        }
        self.inner.state.borrow().clone()
    }

    /// Dispatch an action and return the new state.
    ///
    /// The action function runs synchronously, exactly once, against the
    /// state current at call time. The result is committed unconditionally;
    /// a flush is scheduled only when it differs from the previous state and
    /// none is pending yet. A panic in the action function propagates to the
    /// caller and leaves the state at its pre-call value.
    pub fn dispatch(&self, action: A) -> S {
        self.inner.middleware.borrow_mut().before(&action);

        let prev = self.inner.state.borrow().clone();
        let next = (self.inner.reducer)(&prev, action.clone());
        let changed = next != prev;
        *self.inner.state.borrow_mut() = next.clone();

        if changed && self.inner.pending_flush.borrow().is_none() {
            self.schedule_flush();
        }

        trace!(action = %action.name(), changed, "dispatched action");
        self.inner.middleware.borrow_mut().after(&action, changed);
        next
    }

    /// A dispatch-only handle onto this producer.
    ///
    /// Derived dispatcher traits (see `#[derive(Action)]`) are implemented
    /// for this handle as well as for the producer itself, so action methods
    /// can be passed around without exposing the subscription surface.
    pub fn dispatchers(&self) -> Dispatchers<S, A> {
        Dispatchers {
            producer: self.clone(),
        }
    }

    /// Append a middleware to this producer's dispatch chain.
    ///
    /// `before` hooks run in insertion order, `after` hooks in reverse.
    pub fn add_middleware<M: Middleware<A> + 'static>(&self, middleware: M) {
        self.inner.middleware.borrow_mut().add(middleware);
    }

    /// Run the notification pass now instead of waiting for the deferred
    /// one.
    ///
    /// Cancels any pending deferred flush, then compares the current state
    /// against the last-flushed snapshot: if equal, nothing happens; if
    /// changed, the snapshot is advanced *first* and every subscriber is
    /// notified with `(new, previous_snapshot)` in registration order.
    /// Because the snapshot moves before anyone is notified, a re-entrant
    /// `flush()` cannot replay the same transition, and a dispatch made
    /// inside a callback coalesces into the next flush.
    ///
    /// A selector or callback that panics aborts the pass and skips the
    /// remaining subscribers; the transition still counts as flushed.
    pub fn flush(&self) {
        if let Some(handle) = self.inner.pending_flush.borrow_mut().take() {
            handle.cancel();
        }

        let (state, prev) = {
            let state = self.inner.state.borrow();
            let mut snapshot = self.inner.state_since_flush.borrow_mut();
            if *state == *snapshot {
                return;
            }
            let prev = std::mem::replace(&mut *snapshot, state.clone());
            (state.clone(), prev)
        };

        let subscribers: Vec<Rc<Subscriber<S>>> =
            self.inner.subscribers.borrow().values().cloned().collect();
        trace!(subscribers = subscribers.len(), "flushing state change");

        for subscriber in subscribers {
            if !subscriber.active.get() {
                continue;
            }
            // A callback that flushes a change it just dispatched would
            // re-enter its own slot; skip it rather than panic. Everyone
            // else still hears about that transition, and this subscriber
            // catches up on the next pass.
            if let Ok(mut notify) = subscriber.notify.try_borrow_mut() {
                notify(&state, &prev);
            }
        }
    }

    /// Subscribe to every flushed state change.
    ///
    /// The callback receives `(state, prev_state)`, where `prev_state` is
    /// the state as of the previous flush, not each intermediate value.
    pub fn subscribe(&self, callback: impl FnMut(&S, &S) + 'static) -> Unsubscribe {
        self.register(Box::new(callback))
    }

    /// Subscribe to changes of a selector-derived value.
    ///
    /// The selection is computed once at registration time (a selector panic
    /// propagates to this call) and recomputed on every flush; the callback
    /// fires with `(new_selection, old_selection)` only when the two differ,
    /// making the subscription insensitive to unrelated parts of the state.
    pub fn subscribe_selector<T, F, C>(&self, selector: F, mut callback: C) -> Unsubscribe
    where
        T: PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
        C: FnMut(&T, &T) + 'static,
    {
        let mut selection = selector(&self.inner.state.borrow());

        self.register(Box::new(move |state: &S, _prev: &S| {
            let next = selector(state);
            if next != selection {
                let prev_selection = std::mem::replace(&mut selection, next);
                callback(&selection, &prev_selection);
            }
        }))
    }

    /// Subscribe to the next flushed state change only.
    ///
    /// The subscription removes itself *before* invoking the callback, so
    /// delivery happens at most once even if the callback itself triggers
    /// further flushes.
    pub fn once(&self, callback: impl FnOnce(&S, &S) + 'static) -> Unsubscribe {
        let slot: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let mut callback = Some(callback);

        let detach = slot.clone();
        let unsubscribe = self.subscribe(move |state, prev| {
            if let Some(unsubscribe) = detach.borrow_mut().take() {
                unsubscribe.unsubscribe();
            }
            if let Some(callback) = callback.take() {
                callback(state, prev);
            }
        });

        *slot.borrow_mut() = Some(unsubscribe.clone());
        unsubscribe
    }

    /// Subscribe to the next change of a selector-derived value only.
    pub fn once_selector<T, F, C>(&self, selector: F, callback: C) -> Unsubscribe
    where
        T: PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
        C: FnOnce(&T, &T) + 'static,
    {
        let slot: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let mut callback = Some(callback);

        let detach = slot.clone();
        let unsubscribe = self.subscribe_selector(selector, move |selection, prev| {
            if let Some(unsubscribe) = detach.borrow_mut().take() {
                unsubscribe.unsubscribe();
            }
            if let Some(callback) = callback.take() {
                callback(selection, prev);
            }
        });

        *slot.borrow_mut() = Some(unsubscribe.clone());
        unsubscribe
    }

    /// Wait asynchronously for the selector's derived value to change.
    ///
    /// Resolves with the first post-registration selection that differs from
    /// the current one. Dropping the future cancels the wait and detaches
    /// the underlying subscription; destroying the producer resolves it with
    /// [`WaitError::ProducerDestroyed`](crate::WaitError::ProducerDestroyed).
    pub fn wait<T, F>(&self, selector: F) -> Wait<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let unsubscribe = self.once_selector(selector, move |selection: &T, _prev: &T| {
            let _ = tx.send(selection.clone());
        });
        Wait::new(rx, unsubscribe)
    }

    /// Wait asynchronously for any state change.
    pub fn wait_for_change(&self) -> Wait<S> {
        self.wait(|state: &S| state.clone())
    }

    /// [`subscribe`](Self::subscribe) returning an event-signal style
    /// [`Connection`] handle instead of a bare unsubscribe function.
    pub fn connect(&self, callback: impl FnMut(&S, &S) + 'static) -> Connection {
        Connection::new(self.subscribe(callback))
    }

    /// [`once`](Self::once) returning a [`Connection`] handle.
    pub fn connect_once(&self, callback: impl FnOnce(&S, &S) + 'static) -> Connection {
        Connection::new(self.once(callback))
    }

    /// Cancel any pending flush and drop every subscription.
    ///
    /// The producer remains readable (and dispatchable) afterward, but no
    /// previously registered subscriber will ever be notified again.
    /// In-flight [`wait`](Self::wait) futures resolve with an error.
    pub fn destroy(&self) {
        if let Some(handle) = self.inner.pending_flush.borrow_mut().take() {
            handle.cancel();
        }

        let drained = std::mem::take(&mut *self.inner.subscribers.borrow_mut());
        for subscriber in drained.values() {
            subscriber.active.set(false);
        }
        debug!(dropped = drained.len(), "producer destroyed");
    }

    /// Apply an enhancer: an opaque transformation of this producer into an
    /// augmented one. The handle is cheap to clone, so the enhancer can keep
    /// one and return a wrapper around another.
    pub fn enhance<R>(self, enhancer: impl FnOnce(Self) -> R) -> R {
        enhancer(self)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn register(&self, notify: Box<dyn FnMut(&S, &S)>) -> Unsubscribe {
        let id = self.inner.next_subscription_id.get();
        self.inner.next_subscription_id.set(id + 1);

        let entry = Rc::new(Subscriber {
            active: Cell::new(true),
            notify: RefCell::new(notify),
        });
        self.inner.subscribers.borrow_mut().insert(id, entry.clone());
        trace!(subscription = id, "subscribed");

        // Both captures are weak: a held unsubscribe token must not keep
        // the callback (or the producer) alive once the registry lets go.
        let weak_entry = Rc::downgrade(&entry);
        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(entry) = weak_entry.upgrade() {
                entry.active.set(false);
            }
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().remove(&id);
            }
        })
    }

    fn schedule_flush(&self) {
        if self.inner.pending_flush.borrow().is_some() {
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.scheduler.defer(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let producer = Producer { inner };
                // The handle has fired; clear it before flushing so the
                // flush's own cancel is a no-op and callbacks can schedule
                // the next one.
                producer.inner.pending_flush.borrow_mut().take();
                producer.flush();
            }
        }));
        *self.inner.pending_flush.borrow_mut() = Some(handle);
    }
}

/// Dispatch-only handle returned by
/// [`Producer::dispatchers`](Producer::dispatchers).
pub struct Dispatchers<S, A: Action> {
    producer: Producer<S, A>,
}

impl<S, A: Action> Clone for Dispatchers<S, A> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<S, A> Dispatchers<S, A>
where
    S: Clone + PartialEq + 'static,
    A: Action,
{
    /// Dispatch an action. See [`Producer::dispatch`].
    pub fn dispatch(&self, action: A) -> S {
        self.producer.dispatch(action)
    }
}

impl<S, A: Action> std::fmt::Debug for Dispatchers<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatchers").finish_non_exhaustive()
    }
}
