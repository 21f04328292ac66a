// Copyright (c) 2026 The resim developers. All rights reserved.

//! The cooperative worker that replays items through the pipeline.
//!
//! A worker repeatedly pops a payload from its input stage. For a work
//! item it spends the recorded latencies of each child while contending
//! for downstream capacity, then the item's own finishing compute, then
//! releases the capacity the item held in the input stage. The shutdown
//! marker is handed around the siblings of a role until the last running
//! instance forwards it downstream, so every stage terminates exactly once
//! per marker.

use std::rc::Rc;

use async_trait::async_trait;
use resim_engine::engine::Engine;
use resim_engine::sim_error;
use resim_engine::time::Timer;
use resim_engine::traits::Runnable;
use resim_engine::types::SimResult;
use resim_resources::{StageIn, StageOut};
use resim_track::entity::Entity;
use resim_track::{enter, exit, trace};

use crate::demand::{DemandNode, Payload};
use crate::roster::Roster;

/// A replay worker bound to one input stage and zero or more output
/// stages.
pub struct Worker {
    pub entity: Rc<Entity>,
    role: String,
    timer: Timer,
    roster: Rc<Roster>,
    inq: Rc<dyn StageIn<Payload>>,
    outqs: Vec<Rc<dyn StageOut<Payload>>>,
    by_size: bool,
}

impl Worker {
    /// Create a worker, enlist it on the roster and register it with the
    /// engine.
    ///
    /// Multi-instance roles pass their index so that diagnostics can name
    /// the exact instance (`fine.1`), while the shutdown protocol counts
    /// siblings by role.
    #[allow(clippy::too_many_arguments)]
    pub fn new_and_register(
        engine: &Engine,
        parent: &Rc<Entity>,
        roster: &Rc<Roster>,
        role: &str,
        instance: Option<usize>,
        inq: Rc<dyn StageIn<Payload>>,
        outqs: Vec<Rc<dyn StageOut<Payload>>>,
        by_size: bool,
    ) -> Rc<Self> {
        let name = match instance {
            Some(index) => format!("{role}.{index}"),
            None => role.to_owned(),
        };
        let entity = Rc::new(Entity::new(parent, &name));
        roster.enlist(role, &name);

        let rc_self = Rc::new(Self {
            entity,
            role: role.to_owned(),
            timer: engine.timer(),
            roster: roster.clone(),
            inq,
            outqs,
            by_size,
        });
        engine.register(rc_self.clone());
        rc_self
    }

    /// The output stage with the most spare capacity; ties keep the
    /// earliest stage.
    fn best_queue(&self) -> Option<&Rc<dyn StageOut<Payload>>> {
        let mut candidates = self.outqs.iter();
        let mut best = candidates.next()?;
        for queue in candidates {
            if queue.spare() > best.spare() {
                best = queue;
            }
        }
        Some(best)
    }

    async fn replay_item(&self, node: &Rc<DemandNode>) -> SimResult {
        for child in node.children() {
            // Wait as long as the real run waited to dequeue its input
            self.timer.sleep(child.parent_get()).await;

            let Some(outq) = self.best_queue() else {
                return sim_error!(
                    "{}: item {} has children but no output stage",
                    self.entity,
                    node.tag()
                );
            };

            let size = if self.by_size { child.size() } else { 1 };
            let grant = outq.get(size).await?;
            child.set_grant(grant);

            // Wait as long as the real run waited to hand the child off
            self.timer.sleep(child.parent_push()).await;
            exit!(self.entity ; child.tag());
            outq.push(Payload::Item(child.clone()), Some(grant))?;
        }

        if node.finish() > 0.0 {
            self.timer.sleep(node.finish()).await;
        }

        // Release this item's own capacity back to the input stage,
        // propagating backpressure release upstream. The tree root was
        // seeded without a grant.
        if let Some(grant) = node.take_grant() {
            self.inq.done(grant)?;
        }
        Ok(())
    }

    fn handle_shutdown(&self) -> SimResult {
        if self.roster.count_role(&self.role) == 1 {
            // Last running instance of this role: terminate the stages
            // downstream exactly once
            trace!(self.entity ; "Forwarding shutdown downstream");
            for outq in &self.outqs {
                outq.push(Payload::Shutdown, None)?;
            }
        } else {
            // Hand the termination token to a sibling instance
            trace!(self.entity ; "Passing shutdown to a sibling");
            self.inq.push_back(Payload::Shutdown);
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Runnable for Worker {
    async fn run(&self) -> SimResult {
        loop {
            match self.inq.pop().await {
                Payload::Shutdown => {
                    self.handle_shutdown()?;
                    self.roster.retire(&self.entity.name);
                    return Ok(());
                }
                Payload::Item(node) => {
                    enter!(self.entity ; node.tag());
                    self.replay_item(&node).await?;
                }
            }
        }
    }
}
