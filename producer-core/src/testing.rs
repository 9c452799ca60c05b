//! Test support utilities.
//!
//! [`Recorder`] captures subscription notifications for later assertion,
//! pairing naturally with [`ManualScheduler`](crate::ManualScheduler) in
//! deterministic tests:
//!
//! ```ignore
//! let recorder = Recorder::new();
//! producer.subscribe(recorder.callback(|state| state.count));
//!
//! producer.increment(5);
//! scheduler.run();
//! assert_eq!(recorder.drain(), vec![(5, 0)]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// Collects `(new, previous)` notification pairs from a subscription.
///
/// Clones share the same buffer, so one half can be moved into a callback
/// while the other stays with the test body.
#[derive(Debug)]
pub struct Recorder<T> {
    seen: Rc<RefCell<Vec<(T, T)>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Rc::clone(&self.seen),
        }
    }
}

impl<T: 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Record a notification directly.
    pub fn push(&self, new: T, prev: T) {
        self.seen.borrow_mut().push((new, prev));
    }

    /// A subscription callback recording `selector`-projected pairs.
    pub fn callback<S: 'static>(&self, selector: impl Fn(&S) -> T + 'static) -> impl FnMut(&S, &S) + 'static {
        let sink = self.clone();
        move |state: &S, prev: &S| sink.push(selector(state), selector(prev))
    }

    /// A selector-subscription callback recording the selection pairs as-is.
    pub fn selection_callback(&self) -> impl FnMut(&T, &T) + 'static
    where
        T: Clone,
    {
        let sink = self.clone();
        move |new: &T, prev: &T| sink.push(new.clone(), prev.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    /// Take every recorded pair, leaving the buffer empty.
    pub fn drain(&self) -> Vec<(T, T)> {
        self.seen.borrow_mut().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_drains_pairs() {
        let recorder: Recorder<i32> = Recorder::new();
        assert!(recorder.is_empty());

        recorder.push(2, 1);
        recorder.push(3, 2);
        assert_eq!(recorder.len(), 2);

        assert_eq!(recorder.drain(), vec![(2, 1), (3, 2)]);
        assert!(recorder.is_empty());
    }

    #[test]
    fn default_is_an_empty_recorder() {
        let recorder: Recorder<i32> = Recorder::default();
        assert!(recorder.is_empty());
        assert_eq!(recorder.len(), 0);
    }

    #[test]
    fn clones_share_the_buffer() {
        let recorder: Recorder<&'static str> = Recorder::new();
        let clone = recorder.clone();

        clone.push("new", "old");
        assert_eq!(recorder.drain(), vec![("new", "old")]);
    }

    #[test]
    fn callback_projects_through_the_selector() {
        #[derive(Debug)]
        struct State {
            count: i32,
        }

        let recorder: Recorder<i32> = Recorder::new();
        let mut callback = recorder.callback(|state: &State| state.count);

        callback(&State { count: 5 }, &State { count: 0 });
        assert_eq!(recorder.drain(), vec![(5, 0)]);
    }
}
