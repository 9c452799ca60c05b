//! Deferred-flush scheduling
//!
//! The producer batches state changes by deferring a single flush to the
//! host's next idle tick. The host contract is deliberately narrow (defer a
//! callback once, cancel a pending one) so the core stays testable with a
//! synchronous scheduler and portable across host loops.
//!
//! Two implementations ship with the crate:
//!
//! - [`TokioScheduler`]: defers onto the current tokio [`LocalSet`], for
//!   async hosts.
//! - [`ManualScheduler`]: queues callbacks until the host calls
//!   [`run()`](ManualScheduler::run), for frame/tick loops and for tests.
//!
//! [`LocalSet`]: tokio::task::LocalSet

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

/// Schedules a callback to run once on the host's next idle tick.
///
/// At most one deferred flush is in flight per producer; the producer
/// coalesces further changes into the already-scheduled callback.
pub trait Scheduler {
    /// Request that `callback` be invoked once, asynchronously, on the next
    /// idle tick. The returned handle cancels the invocation if it has not
    /// fired yet.
    fn defer(&self, callback: Box<dyn FnOnce()>) -> DeferHandle;
}

/// Handle to a deferred callback.
///
/// Cancellation is idempotent and is a no-op once the callback has fired.
#[derive(Debug, Clone)]
pub struct DeferHandle {
    token: CancellationToken,
}

impl DeferHandle {
    /// Create a fresh, uncancelled handle.
    ///
    /// Scheduler implementations hand out one handle per deferred callback
    /// and check [`is_cancelled`](Self::is_cancelled) before invoking it.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel the deferred callback if it has not fired yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the callback was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for DeferHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler backed by the current tokio [`LocalSet`](tokio::task::LocalSet).
///
/// Defers the callback with `spawn_local` behind a `yield_now`, so it runs
/// after the currently executing task yields, the async equivalent of "the
/// next idle tick". Producer callbacks close over `Rc` state and are not
/// `Send`, hence the local spawn.
///
/// # Panics
///
/// `defer` panics if called outside a `LocalSet` context, as
/// `tokio::task::spawn_local` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn defer(&self, callback: Box<dyn FnOnce()>) -> DeferHandle {
        let handle = DeferHandle::new();
        let token = handle.token.clone();
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            if !token.is_cancelled() {
                callback();
            }
        });
        handle
    }
}

/// Scheduler driven explicitly by the host.
///
/// Callbacks queue up until [`run`](Self::run) drains them, which the host
/// calls once per frame/tick. Callbacks deferred *while* `run` executes land
/// in the queue for the next `run` call, which is exactly the re-entrancy
/// the producer relies on: a dispatch made inside a flush callback schedules
/// a flush for the following tick, never the current one.
///
/// Cloning is cheap and clones share the same queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<VecDeque<(DeferHandle, Box<dyn FnOnce()>)>>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the queue, invoking every callback that was not cancelled.
    ///
    /// Returns the number of callbacks that actually ran.
    pub fn run(&self) -> usize {
        // Take the whole batch up front so callbacks that defer new work
        // push onto a fresh queue for the next tick.
        let batch: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        let mut ran = 0;
        for (handle, callback) in batch {
            if !handle.is_cancelled() {
                callback();
                ran += 1;
            }
        }
        ran
    }

    /// Number of callbacks waiting for the next [`run`](Self::run),
    /// including cancelled ones that have not been drained yet.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, callback: Box<dyn FnOnce()>) -> DeferHandle {
        let handle = DeferHandle::new();
        self.queue
            .borrow_mut()
            .push_back((handle.clone(), callback));
        handle
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn manual_scheduler_runs_deferred_callbacks() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(0));

        let f = fired.clone();
        scheduler.defer(Box::new(move || f.set(f.get() + 1)));

        assert_eq!(fired.get(), 0);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.run(), 1);
        assert_eq!(fired.get(), 1);
        assert_eq!(scheduler.pending(), 0);

        // Nothing left to run
        assert_eq!(scheduler.run(), 0);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn cancelled_callbacks_do_not_run() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));

        let f = fired.clone();
        let handle = scheduler.defer(Box::new(move || f.set(true)));

        handle.cancel();
        assert!(handle.is_cancelled());

        assert_eq!(scheduler.run(), 0);
        assert!(!fired.get());

        // Cancelling again is a no-op
        handle.cancel();
    }

    #[test]
    fn callbacks_deferred_during_run_wait_for_next_tick() {
        let scheduler = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let sched = scheduler.clone();
        let log = order.clone();
        scheduler.defer(Box::new(move || {
            log.borrow_mut().push("first");
            let log = log.clone();
            sched.defer(Box::new(move || log.borrow_mut().push("second")));
        }));

        assert_eq!(scheduler.run(), 1);
        assert_eq!(*order.borrow(), vec!["first"]);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.run(), 1);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn tokio_scheduler_defers_to_next_tick() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let fired = Rc::new(Cell::new(false));

                let f = fired.clone();
                TokioScheduler.defer(Box::new(move || f.set(true)));

                // Not yet: the callback runs after we yield to the LocalSet.
                assert!(!fired.get());

                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(fired.get());
            })
            .await;
    }

    #[tokio::test]
    async fn tokio_scheduler_respects_cancellation() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let fired = Rc::new(Cell::new(false));

                let f = fired.clone();
                let handle = TokioScheduler.defer(Box::new(move || f.set(true)));
                handle.cancel();

                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(!fired.get());
            })
            .await;
    }
}
