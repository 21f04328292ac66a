// Copyright (c) 2026 The resim developers. All rights reserved.

//! Reconstruction of the demand tree from a recorded trace.
//!
//! The real pipeline's stages each recorded a flat action sequence. Walking
//! a stage's sequence against the ordered list of work items its *parent*
//! stage emitted recovers, for every item, which child items it produced
//! and the latencies the real run observed around each handoff. Doing this
//! once per pipeline depth level rebuilds the full work-item tree.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use resim_engine::sim_error;
use resim_engine::types::SimError;
use resim_resources::Grant;
use resim_track::entity::Entity;
use resim_track::{Tag, create_tag};

use crate::trace::{Action, ActionKind, DEVICE_ROLE, FINE_ROLE, MAIN_ROLE, MESHER_ROLE, Trace};

/// One unit of work as it existed in the real run.
///
/// Nodes are created during trace replay and, apart from the transient
/// `grant` handle, never change once the tree is fully built.
pub struct DemandNode {
    tag: Tag,

    /// Demand weight: the recorded `push` value (bytes) when present,
    /// otherwise 1.
    size: Cell<u64>,

    /// Compute time charged to this node after its last handoff.
    finish: Cell<f64>,

    /// Time the producing worker waited to dequeue before creating this
    /// node.
    parent_get: f64,

    /// Time the producing worker waited for downstream capacity before
    /// handing this node off.
    parent_push: f64,

    /// Child nodes in creation order. Mutated only while the tree is being
    /// built.
    children: RefCell<Vec<Rc<DemandNode>>>,

    /// Stage capacity currently held for this node, owned from the grant
    /// during replay until the consuming stage releases it.
    grant: Cell<Option<Grant>>,
}

impl DemandNode {
    /// Create a detached node with default weight and no recorded finish.
    #[must_use]
    pub fn new(tag: Tag, parent_get: f64, parent_push: f64) -> Rc<Self> {
        Rc::new(Self {
            tag,
            size: Cell::new(1),
            finish: Cell::new(0.0),
            parent_get,
            parent_push,
            children: RefCell::new(Vec::new()),
            grant: Cell::new(None),
        })
    }

    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.get()
    }

    #[must_use]
    pub fn finish(&self) -> f64 {
        self.finish.get()
    }

    #[must_use]
    pub fn parent_get(&self) -> f64 {
        self.parent_get
    }

    #[must_use]
    pub fn parent_push(&self) -> f64 {
        self.parent_push
    }

    /// The node's children, in creation order.
    #[must_use]
    pub fn children(&self) -> Vec<Rc<DemandNode>> {
        self.children.borrow().clone()
    }

    pub fn set_grant(&self, grant: Grant) {
        self.grant.set(Some(grant));
    }

    pub fn take_grant(&self) -> Option<Grant> {
        self.grant.take()
    }

    /// Number of nodes in the tree rooted here, including this one.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        1 + self
            .children
            .borrow()
            .iter()
            .map(|c| c.num_nodes())
            .sum::<usize>()
    }
}

impl fmt::Debug for DemandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemandNode")
            .field("tag", &self.tag)
            .field("size", &self.size.get())
            .field("finish", &self.finish.get())
            .field("parent_get", &self.parent_get)
            .field("parent_push", &self.parent_push)
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

/// The payload type flowing through every stage queue.
#[derive(Clone, Debug)]
pub enum Payload {
    /// A work item to replay.
    Item(Rc<DemandNode>),
    /// The drain/termination sentinel.
    Shutdown,
}

/// Replay one stage's recorded actions against the list of work items its
/// parent stage emitted, returning the list this stage emitted.
///
/// The walk keeps a time cursor `base`. A `bbox`/`pop` advances to the next
/// parent item and moves the cursor to the action's stop time; a `get`
/// records the elapsed wait and advances the cursor; a `push` records the
/// elapsed wait, creates the child and resets the parent's `finish` (only
/// compute recorded after the last handoff counts as the parent's own
/// finishing work); `compute`/`load` accumulate into the parent's `finish`;
/// `write` is latency-free.
///
/// The parent list must be exactly exhausted by the walk. A surplus of
/// recorded `bbox`/`pop` actions stops the walk early instead, mirroring
/// the recording tool's behaviour on truncated runs.
pub fn replay_stage(
    entity: &Rc<Entity>,
    actions: &[Action],
    parents: &[Rc<DemandNode>],
) -> Result<Vec<Rc<DemandNode>>, SimError> {
    let mut emitted = Vec::new();
    let mut next_parent = 0;
    let mut item: Option<&Rc<DemandNode>> = None;
    let mut base = 0.0;
    let mut parent_get = 0.0;

    for action in actions {
        match action.kind {
            ActionKind::Bbox | ActionKind::Pop => {
                if next_parent == parents.len() {
                    break;
                }
                item = Some(&parents[next_parent]);
                next_parent += 1;
                base = action.stop;
            }
            ActionKind::Get => {
                if item.is_none() {
                    return sim_error!("Get action before the first bbox/pop");
                }
                parent_get = action.start - base;
                base = action.stop;
            }
            ActionKind::Push => {
                let Some(parent) = item else {
                    return sim_error!("Push action before the first bbox/pop");
                };
                let parent_push = action.start - base;
                base = action.stop;

                let child = DemandNode::new(create_tag!(entity), parent_get, parent_push);
                if let Some(value) = action.value {
                    child.size.set(value as u64);
                }
                parent.children.borrow_mut().push(child.clone());
                emitted.push(child);
                parent.finish.set(0.0);
            }
            ActionKind::Compute | ActionKind::Load => {
                let Some(parent) = item else {
                    return sim_error!("{:?} action before the first bbox/pop", action.kind);
                };
                parent
                    .finish
                    .set(parent.finish.get() + (action.stop - action.start));
            }
            ActionKind::Write => {}
        }
    }

    if next_parent != parents.len() {
        return sim_error!(
            "Parent queue was not exhausted: {} of {} items consumed",
            next_parent,
            parents.len()
        );
    }
    Ok(emitted)
}

/// Rebuild the full demand tree from a validated trace.
///
/// Each level's output list feeds the next level as its parent list:
/// root -> coarse buckets -> fine buckets -> device-visible mesh units.
pub fn build_tree(entity: &Rc<Entity>, trace: &Trace) -> Result<Rc<DemandNode>, SimError> {
    let root = DemandNode::new(create_tag!(entity), 0.0, 0.0);

    let mut parents = vec![root.clone()];
    for role in [MAIN_ROLE, FINE_ROLE, DEVICE_ROLE, MESHER_ROLE] {
        let worker = match trace.worker(role) {
            Some(worker) => worker,
            None => return sim_error!("Trace has no worker named {role}"),
        };
        parents = replay_stage(entity, &worker.actions, &parents)
            .map_err(|e| SimError(format!("{role}: {}", e.0)))?;
    }

    Ok(root)
}
