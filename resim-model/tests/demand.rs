// Copyright (c) 2026 The resim developers. All rights reserved.

use std::rc::Rc;

use resim_model::demand::{DemandNode, build_tree, replay_stage};
use resim_model::trace::{Action, ActionKind, Trace};
use resim_track::create_tag;
use resim_track::entity::{Entity, toplevel};
use resim_track::tracker::dev_null_tracker;

fn act(kind: ActionKind, start: f64, stop: f64) -> Action {
    Action {
        kind,
        start,
        stop,
        value: None,
    }
}

fn push_act(start: f64, stop: f64, value: Option<f64>) -> Action {
    Action {
        kind: ActionKind::Push,
        start,
        stop,
        value,
    }
}

fn test_entity() -> Rc<Entity> {
    let tracker = dev_null_tracker();
    toplevel(&tracker, "top")
}

fn parent(entity: &Rc<Entity>) -> Rc<DemandNode> {
    DemandNode::new(create_tag!(entity), 0.0, 0.0)
}

#[test]
fn latencies_and_sizes_are_recovered() {
    let entity = test_entity();
    let root = parent(&entity);

    let actions = [
        act(ActionKind::Bbox, 0.0, 1.0),
        act(ActionKind::Get, 3.0, 3.5),
        push_act(5.5, 6.0, Some(64.0)),
        act(ActionKind::Get, 6.0, 6.25),
        push_act(7.25, 7.5, None),
        act(ActionKind::Compute, 7.5, 9.0),
    ];

    let emitted = replay_stage(&entity, &actions, &[root.clone()]).unwrap();
    assert_eq!(emitted.len(), 2);

    // First child: waited 3.0 - 1.0 to dequeue, 5.5 - 3.5 to hand off
    assert_eq!(emitted[0].parent_get(), 2.0);
    assert_eq!(emitted[0].parent_push(), 2.0);
    assert_eq!(emitted[0].size(), 64);

    // Second child: get right after the first push, default weight
    assert_eq!(emitted[1].parent_get(), 0.0);
    assert_eq!(emitted[1].parent_push(), 1.0);
    assert_eq!(emitted[1].size(), 1);

    // Root keeps only the compute recorded after its last push
    assert_eq!(root.finish(), 1.5);
    assert_eq!(root.children().len(), 2);
    assert_eq!(root.num_nodes(), 3);
}

#[test]
fn finish_resets_on_each_push() {
    let entity = test_entity();
    let root = parent(&entity);

    let actions = [
        act(ActionKind::Bbox, 0.0, 0.0),
        act(ActionKind::Compute, 0.0, 5.0),
        act(ActionKind::Get, 5.0, 5.0),
        push_act(5.0, 5.0, None),
        act(ActionKind::Load, 5.0, 5.5),
        act(ActionKind::Compute, 5.5, 6.0),
        act(ActionKind::Write, 6.0, 7.0),
    ];

    replay_stage(&entity, &actions, &[root.clone()]).unwrap();

    // The 5.0 of compute before the push is dropped; load and compute
    // after it accumulate; write adds nothing.
    assert_eq!(root.finish(), 1.0);
}

#[test]
fn unconsumed_parents_are_an_error() {
    let entity = test_entity();
    let parents = [parent(&entity), parent(&entity)];

    let actions = [act(ActionKind::Pop, 0.0, 0.0)];

    let message = format!(
        "{}",
        replay_stage(&entity, &actions, &parents).unwrap_err()
    );
    assert!(
        message.contains("Parent queue was not exhausted: 1 of 2"),
        "unexpected message: {message}"
    );
}

#[test]
fn surplus_pops_stop_the_walk() {
    let entity = test_entity();
    let parents = [parent(&entity)];

    let actions = [
        act(ActionKind::Pop, 0.0, 0.0),
        act(ActionKind::Pop, 1.0, 1.0),
        act(ActionKind::Compute, 1.0, 2.0),
    ];

    let emitted = replay_stage(&entity, &actions, &parents).unwrap();
    assert!(emitted.is_empty());
    // The walk stopped at the surplus pop, so the later compute was never
    // charged.
    assert_eq!(parents[0].finish(), 0.0);
}

#[test]
fn action_before_first_dequeue_is_an_error() {
    let entity = test_entity();
    let parents = [parent(&entity)];

    let actions = [act(ActionKind::Compute, 0.0, 1.0)];
    assert!(replay_stage(&entity, &actions, &parents).is_err());
}

#[test]
fn build_tree_runs_all_four_levels() {
    let entity = test_entity();
    let trace = Trace::from_string(
        "
workers:
  - name: main
    actions:
      - { kind: bbox, start: 0.0, stop: 0.0 }
      - { kind: get, start: 0.5, stop: 0.5 }
      - { kind: push, start: 0.8, stop: 0.8 }
  - name: bucket.fine.0
    actions:
      - { kind: pop, start: 0.8, stop: 0.8 }
      - { kind: get, start: 1.5, stop: 1.5 }
      - { kind: push, start: 1.7, stop: 1.7 }
  - name: device.0
    actions:
      - { kind: pop, start: 1.7, stop: 1.7 }
      - { kind: get, start: 2.1, stop: 2.1 }
      - { kind: push, start: 2.2, stop: 2.2 }
  - name: mesher.0
    actions:
      - { kind: pop, start: 2.2, stop: 2.2 }
      - { kind: compute, start: 2.2, stop: 2.8 }
",
    )
    .unwrap();

    let root = build_tree(&entity, &trace).unwrap();
    assert_eq!(root.num_nodes(), 4);

    let coarse = &root.children()[0];
    let fine = &coarse.children()[0];
    let mesh = &fine.children()[0];
    assert_eq!(coarse.parent_get(), 0.5);
    assert!((mesh.finish() - 0.6).abs() < 1e-12);
    assert!(mesh.children().is_empty());
}

#[test]
fn build_tree_reports_mismatched_levels() {
    let entity = test_entity();
    // The fine stage never pops the coarse item that main emitted
    let trace = Trace::from_string(
        "
workers:
  - name: main
    actions:
      - { kind: bbox, start: 0.0, stop: 0.0 }
      - { kind: get, start: 0.5, stop: 0.5 }
      - { kind: push, start: 0.8, stop: 0.8 }
  - name: bucket.fine.0
  - name: device.0
  - name: mesher.0
",
    )
    .unwrap();

    let message = format!("{}", build_tree(&entity, &trace).unwrap_err());
    assert!(message.contains("bucket.fine.0"));
    assert!(message.contains("not exhausted"));
}
