// Copyright (c) 2026 The resim developers. All rights reserved.

use resim_track::entity::{Entity, toplevel};
use resim_track::test_helpers::check_and_clear;
use resim_track::{Tag, create_tag, enter, exit, info, test_init, trace};
use std::rc::Rc;

#[test]
fn log_macros() {
    let (test_tracker, tracker) = test_init!(10);
    let top = toplevel(&tracker, "top");
    let worker = Rc::new(Entity::new(&top, "worker"));

    info!(worker ; "hello {}", 42);
    trace!(top ; "tick");

    check_and_clear(&test_tracker, &["11:INFO: hello 42", "10:TRACE: tick"]);
}

#[test]
fn enter_exit_events() {
    let (test_tracker, tracker) = test_init!(20);
    let top = toplevel(&tracker, "top");
    let queue = Rc::new(Entity::new(&top, "queue"));

    let item: Tag = create_tag!(queue);
    enter!(queue ; item);
    exit!(queue ; item);

    check_and_clear(&test_tracker, &["21: 22 entered", "21: 22 exited"]);
}

#[test]
fn full_names() {
    let (_test_tracker, tracker) = test_init!(30);
    let top = toplevel(&tracker, "top");
    let fine = Rc::new(Entity::new(&top, "fine.0"));

    assert_eq!(fine.full_name(), "top::fine.0");
    assert_eq!(format!("{fine}"), "top::fine.0");
}
