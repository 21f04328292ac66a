// Copyright (c) 2026 The resim developers. All rights reserved.

use std::cell::RefCell;
use std::rc::Rc;

use resim_engine::test_helpers::start_test;
use resim_resources::pool::Discipline;
use resim_resources::stage::{BoundedQueue, Grant, SlotQueue, StageIn, StageOut};

#[test]
fn bounded_queue_roundtrip() {
    let mut engine = start_test(file!());

    let queue: Rc<BoundedQueue<i32>> = Rc::new(BoundedQueue::new(4, Discipline::Unordered));

    {
        let queue = queue.clone();
        engine.spawn(async move {
            let grant = queue.get(2).await?;
            assert_eq!(queue.spare(), 2);
            queue.push(7, Some(grant))?;

            let value = queue.pop().await;
            assert_eq!(value, 7);

            queue.done(grant)?;
            assert_eq!(queue.spare(), 4);
            Ok(())
        });
    }

    engine.run().unwrap();
}

#[test]
fn bounded_queue_rejects_slot_tokens() {
    let queue: BoundedQueue<i32> = BoundedQueue::new(4, Discipline::Unordered);
    assert!(StageIn::done(&queue, Grant::Slot(0)).is_err());
}

#[test]
fn slot_tokens_are_seeded_round_robin() {
    let mut engine = start_test(file!());

    let queue: Rc<SlotQueue<i32>> = Rc::new(SlotQueue::new(2, 2));

    {
        let queue = queue.clone();
        engine.spawn(async move {
            let mut tokens = Vec::new();
            for _ in 0..4 {
                match queue.get(1).await? {
                    Grant::Slot(idx) => tokens.push(idx),
                    Grant::Region(_) => panic!("slot queue granted a region"),
                }
            }
            assert_eq!(tokens, vec![0, 1, 0, 1]);
            Ok(())
        });
    }

    engine.run().unwrap();
}

#[test]
fn slot_grant_routes_to_its_subqueue() {
    let mut engine = start_test(file!());

    let queue: Rc<SlotQueue<&str>> = Rc::new(SlotQueue::new(1, 2));
    let sub0 = Rc::new(queue.subqueue(0));
    let sub1 = Rc::new(queue.subqueue(1));
    let received = Rc::new(RefCell::new(Vec::new()));

    for (name, sub) in [("sub0", sub0.clone()), ("sub1", sub1.clone())] {
        let received = received.clone();
        engine.spawn(async move {
            let value = sub.pop().await;
            received.borrow_mut().push((name, value));
            sub.done(Grant::Slot(0))?;
            Ok(())
        });
    }

    {
        let queue = queue.clone();
        engine.spawn(async move {
            // Token 0 first, then token 1: each payload lands only on the
            // sub-queue its token names.
            let first = queue.get(1).await?;
            queue.push("to-zero", Some(first))?;
            let second = queue.get(1).await?;
            queue.push("to-one", Some(second))?;
            Ok(())
        });
    }

    engine.run().unwrap();

    assert_eq!(
        *received.borrow(),
        vec![("sub0", "to-zero"), ("sub1", "to-one")]
    );
    // Both tokens came back to the shared pool
    assert_eq!(queue.spare(), 2);
}

#[test]
fn ungranted_push_broadcasts_to_every_subqueue() {
    let mut engine = start_test(file!());

    let queue: Rc<SlotQueue<&str>> = Rc::new(SlotQueue::new(1, 3));
    let received = Rc::new(RefCell::new(0));

    for idx in 0..3 {
        let sub = queue.subqueue(idx);
        let received = received.clone();
        engine.spawn(async move {
            let value = sub.pop().await;
            assert_eq!(value, "stop");
            *received.borrow_mut() += 1;
            Ok(())
        });
    }

    queue.push("stop", None).unwrap();

    engine.run().unwrap();

    assert_eq!(*received.borrow(), 3);
}

#[test]
fn subqueue_rejects_pool_ranges() {
    let queue: SlotQueue<i32> = SlotQueue::new(1, 1);
    let sub = queue.subqueue(0);
    assert!(
        sub.done(Grant::Region(resim_resources::pool::Region { start: 0, end: 1 }))
            .is_err()
    );
}
