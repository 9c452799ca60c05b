//! End-to-end counter flow: batching, selectors, once, wait, middleware.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use producer::prelude::*;
use producer::Recorder;
use tokio::task::LocalSet;

#[derive(Clone, Debug, PartialEq)]
struct AppState {
    count: i32,
    status: &'static str,
}

impl AppState {
    fn new() -> Self {
        Self {
            count: 0,
            status: "idle",
        }
    }
}

#[derive(Action, Clone, Debug)]
#[action(state = "AppState", dispatchers)]
enum AppAction {
    Increment { by: i32 },
    SetStatus(&'static str),
}

fn reducer(state: &AppState, action: AppAction) -> AppState {
    match action {
        AppAction::Increment { by } => AppState {
            count: state.count + by,
            ..state.clone()
        },
        AppAction::SetStatus(status) => AppState {
            status,
            ..state.clone()
        },
    }
}

fn manual() -> (Producer<AppState, AppAction>, ManualScheduler) {
    let scheduler = ManualScheduler::new();
    let producer = Producer::with_scheduler(AppState::new(), reducer, scheduler.clone());
    (producer, scheduler)
}

#[test]
fn dispatches_between_ticks_coalesce() {
    let (producer, scheduler) = manual();
    let recorder: Recorder<i32> = Recorder::new();
    producer.subscribe(recorder.callback(|state: &AppState| state.count));

    producer.increment(5);
    producer.increment(3);
    scheduler.run();

    assert_eq!(recorder.drain(), vec![(8, 0)]);
}

#[test]
fn selector_subscription_sees_only_its_slice() {
    let (producer, scheduler) = manual();
    let recorder: Recorder<i32> = Recorder::new();
    producer.subscribe_selector(|state| state.count, recorder.selection_callback());

    producer.set_status("busy");
    scheduler.run();
    assert!(recorder.is_empty());

    producer.increment(1);
    scheduler.run();
    assert_eq!(recorder.drain(), vec![(1, 0)]);
}

#[test]
fn once_fires_for_the_next_flush_only() {
    let (producer, scheduler) = manual();
    let recorder: Recorder<i32> = Recorder::new();
    let sink = recorder.clone();
    producer.once(move |state: &AppState, prev: &AppState| sink.push(state.count, prev.count));

    producer.increment(1);
    scheduler.run();
    producer.increment(1);
    scheduler.run();

    assert_eq!(recorder.drain(), vec![(1, 0)]);
    assert_eq!(producer.subscriber_count(), 0);
}

#[test]
fn action_log_records_dispatches() {
    let (producer, _scheduler) = manual();
    let log = ActionLog::with_excludes(16, vec!["Set*".to_string()]);
    producer.add_middleware(log.clone());

    producer.increment(1);
    producer.set_status("busy");
    producer.increment(2);

    let names: Vec<&str> = log.recent(10).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["Increment", "Increment"]);
}

#[tokio::test]
async fn flushes_on_the_local_set_tick() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let producer = Producer::new(AppState::new(), reducer);
            let recorder: Recorder<i32> = Recorder::new();
            producer.subscribe(recorder.callback(|state: &AppState| state.count));

            producer.increment(5);
            producer.increment(3);
            tokio::time::sleep(Duration::from_millis(10)).await;

            assert_eq!(recorder.drain(), vec![(8, 0)]);
        })
        .await;
}

#[tokio::test]
async fn wait_resolves_via_the_deferred_flush() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let producer = Producer::new(AppState::new(), reducer);

            let wait = producer.wait(|state| state.count);
            producer.increment(7);

            assert_eq!(wait.await, Ok(7));
        })
        .await;
}

#[tokio::test]
async fn wait_errors_after_destroy() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let producer = Producer::new(AppState::new(), reducer);

            let wait = producer.wait(|state| state.count);
            producer.destroy();

            assert_eq!(wait.await, Err(WaitError::ProducerDestroyed));
        })
        .await;
}

#[test]
fn enhance_can_wrap_the_producer() {
    struct Counter {
        producer: Producer<AppState, AppAction>,
        dispatched: Rc<RefCell<u32>>,
    }

    impl Counter {
        fn bump(&self) -> AppState {
            *self.dispatched.borrow_mut() += 1;
            self.producer.increment(1)
        }
    }

    let (producer, scheduler) = manual();
    let counter = producer.enhance(|producer| Counter {
        producer,
        dispatched: Rc::new(RefCell::new(0)),
    });

    counter.bump();
    counter.bump();
    scheduler.run();

    assert_eq!(*counter.dispatched.borrow(), 2);
    assert_eq!(counter.producer.state().count, 2);
}
