//! Tests for the #[derive(Action)] macro

use producer::prelude::*;
use producer::Recorder;

#[derive(Clone, Debug, PartialEq)]
struct CounterState {
    count: i32,
    label: String,
}

impl CounterState {
    fn new() -> Self {
        Self {
            count: 0,
            label: String::new(),
        }
    }
}

#[derive(Action, Clone, Debug)]
#[action(state = "CounterState", dispatchers)]
enum CounterAction {
    Increment { by: i32 },
    SetLabel(String),
    Reset,
}

fn reducer(state: &CounterState, action: CounterAction) -> CounterState {
    match action {
        CounterAction::Increment { by } => CounterState {
            count: state.count + by,
            ..state.clone()
        },
        CounterAction::SetLabel(label) => CounterState {
            label,
            ..state.clone()
        },
        CounterAction::Reset => CounterState::new(),
    }
}

#[test]
fn derives_name_for_every_variant_style() {
    assert_eq!(CounterAction::Increment { by: 1 }.name(), "Increment");
    assert_eq!(CounterAction::SetLabel("x".into()).name(), "SetLabel");
    assert_eq!(CounterAction::Reset.name(), "Reset");
}

#[test]
fn dispatcher_methods_build_and_commit_actions() {
    let scheduler = ManualScheduler::new();
    let producer = Producer::with_scheduler(CounterState::new(), reducer, scheduler);

    // Struct variant: named parameter
    let state = producer.increment(5);
    assert_eq!(state.count, 5);

    // Tuple variant: positional parameter
    let state = producer.set_label("hello".to_string());
    assert_eq!(state.label, "hello");
    assert_eq!(state.count, 5);

    // Unit variant: no parameters
    let state = producer.reset();
    assert_eq!(state, CounterState::new());
}

#[test]
fn dispatcher_methods_work_on_the_dispatch_handle() {
    let scheduler = ManualScheduler::new();
    let producer = Producer::with_scheduler(CounterState::new(), reducer, scheduler.clone());

    let recorder: Recorder<i32> = Recorder::new();
    producer.subscribe(recorder.callback(|state: &CounterState| state.count));

    let dispatchers = producer.dispatchers();
    dispatchers.increment(2);
    dispatchers.increment(3);
    scheduler.run();

    assert_eq!(producer.state().count, 5);
    assert_eq!(recorder.drain(), vec![(5, 0)]);
}

#[test]
fn derive_without_dispatchers_only_implements_name() {
    #[derive(Action, Clone, Debug)]
    enum Bare {
        Tick,
        Scroll(u16),
    }

    assert_eq!(Bare::Tick.name(), "Tick");
    assert_eq!(Bare::Scroll(3).name(), "Scroll");
}
