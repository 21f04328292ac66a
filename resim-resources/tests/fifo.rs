// Copyright (c) 2026 The resim developers. All rights reserved.

use std::cell::RefCell;
use std::rc::Rc;

use resim_engine::test_helpers::start_test;
use resim_resources::fifo::Fifo;

#[test]
fn pops_preserve_push_order() {
    let mut engine = start_test(file!());

    let fifo: Fifo<i32> = Fifo::new();
    for value in 1..=5 {
        fifo.push(value);
    }
    assert_eq!(fifo.len(), 5);

    let popped = Rc::new(RefCell::new(Vec::new()));
    {
        let fifo = fifo.clone();
        let popped = popped.clone();
        engine.spawn(async move {
            for _ in 0..5 {
                let value = fifo.pop().await;
                popped.borrow_mut().push(value);
            }
            Ok(())
        });
    }

    engine.run().unwrap();

    assert_eq!(*popped.borrow(), vec![1, 2, 3, 4, 5]);
    assert!(fifo.is_empty());
}

#[test]
fn waiting_consumers_are_served_in_registration_order() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    let fifo: Fifo<&str> = Fifo::new();
    let delivered = Rc::new(RefCell::new(Vec::new()));

    // Two consumers park on the empty queue before anything is pushed.
    for consumer in ["first", "second"] {
        let fifo = fifo.clone();
        let delivered = delivered.clone();
        engine.spawn(async move {
            let value = fifo.pop().await;
            delivered.borrow_mut().push((consumer, value));
            Ok(())
        });
    }

    {
        let fifo = fifo.clone();
        engine.spawn(async move {
            timer.sleep(1.0).await;
            fifo.push("one");
            fifo.push("two");
            Ok(())
        });
    }

    engine.run().unwrap();

    assert_eq!(
        *delivered.borrow(),
        vec![("first", "one"), ("second", "two")]
    );
}
