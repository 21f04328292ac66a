// Copyright (c) 2026 The resim developers. All rights reserved.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use resim_engine::test_helpers::start_test;
use resim_engine::traits::Runnable;
use resim_engine::types::SimResult;

#[test]
fn empty_run() {
    let mut engine = start_test(file!());
    engine.run().unwrap();
    assert_eq!(engine.time_now(), 0.0);
}

#[test]
fn time_advances_to_last_sleep() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    for wait in [1.5, 4.25, 2.0] {
        let timer = timer.clone();
        engine.spawn(async move {
            timer.sleep(wait).await;
            Ok(())
        });
    }

    engine.run().unwrap();
    assert_eq!(engine.time_now(), 4.25);
}

#[test]
fn sequential_sleeps_accumulate() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    {
        let timer = timer.clone();
        engine.spawn(async move {
            timer.sleep(1.0).await;
            timer.sleep(2.0).await;
            timer.sleep(0.5).await;
            Ok(())
        });
    }

    engine.run().unwrap();
    assert_eq!(engine.time_now(), 3.5);
}

struct Ticker {
    fired: Rc<RefCell<bool>>,
}

#[async_trait(?Send)]
impl Runnable for Ticker {
    async fn run(&self) -> SimResult {
        *self.fired.borrow_mut() = true;
        Ok(())
    }
}

#[test]
fn registered_component_is_spawned() {
    let mut engine = start_test(file!());
    let fired = Rc::new(RefCell::new(false));
    let ticker = Rc::new(Ticker {
        fired: fired.clone(),
    });
    engine.register(ticker);

    engine.run().unwrap();
    assert!(*fired.borrow());
}

#[test]
fn equal_time_wakeups_run_in_scheduling_order() {
    let mut engine = start_test(file!());
    let timer = engine.timer();
    let order = Rc::new(RefCell::new(Vec::new()));

    // All three tasks wake at t=2.0; the resume order must be the order in
    // which the sleeps were scheduled, not anything about the tasks
    // themselves.
    for name in ["first", "second", "third"] {
        let timer = timer.clone();
        let order = order.clone();
        engine.spawn(async move {
            timer.sleep(2.0).await;
            order.borrow_mut().push(name);
            Ok(())
        });
    }

    engine.run().unwrap();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn zero_duration_sleep_suspends_once() {
    let mut engine = start_test(file!());
    let timer = engine.timer();
    let order = Rc::new(RefCell::new(Vec::new()));

    {
        let timer = timer.clone();
        let order = order.clone();
        engine.spawn(async move {
            timer.sleep(0.0).await;
            order.borrow_mut().push("sleeper");
            Ok(())
        });
    }
    {
        let order = order.clone();
        engine.spawn(async move {
            order.borrow_mut().push("immediate");
            Ok(())
        });
    }

    engine.run().unwrap();
    // The zero-length sleep parks its task until the timer is drained, so
    // the non-sleeping task runs first even though it was spawned second.
    assert_eq!(*order.borrow(), vec!["immediate", "sleeper"]);
    assert_eq!(engine.time_now(), 0.0);
}
