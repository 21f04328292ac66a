// Copyright (c) 2026 The resim developers. All rights reserved.

//! Assembly of the fixed pipeline topology.
//!
//! ```text
//!  seed -> coarse -> coarse_queue -> fine x T -> fine_queue x G
//!       -> device x G -> mesh_queue -> mesher
//! ```
//!
//! Every channel is a [`BoundedQueue`] whose pool capacity is derived from
//! the [`ReplayConfig`]; alternatively the fine -> device binding can run
//! through a single [`SlotQueue`], modelling the fine workers binding each
//! item to one of several interchangeable device instances.

use std::rc::Rc;

use resim_engine::engine::Engine;
use resim_engine::sim_error;
use resim_engine::types::SimError;
use resim_resources::pool::Discipline;
use resim_resources::stage::{BoundedQueue, SlotQueue, StageIn, StageOut};
use resim_track::entity::Entity;
use resim_track::{error, info};

use crate::demand::{DemandNode, Payload};
use crate::roster::Roster;
use crate::worker::Worker;

const MIB: u64 = 1024 * 1024;

/// Capacity used when all caps are disabled. Large enough that no recorded
/// demand can exhaust it, small enough that sums of grants cannot
/// overflow.
const UNBOUNDED: u64 = 1 << 60;

/// The tunable parameters of a replay run.
///
/// Defaults match the capacities the real pipeline ran with.
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Account demand in recorded bytes instead of item counts. Also
    /// switches the pools to the ring-buffer discipline, which is how the
    /// real byte-sized allocators behave.
    pub by_size: bool,

    /// Disable all capacity caps.
    pub infinite: bool,

    /// Number of fine-bucketing worker instances.
    pub bucket_threads: usize,

    /// Number of device instances, each with its own fine-output queue.
    pub gpus: usize,

    /// Extra unit-count slack on the coarse queue.
    pub coarse_spare: u64,

    /// Minimum unit-count slack on the fine queues.
    pub bucket_spare: u64,

    /// Extra slack on the mesh queue. Only meaningful together with
    /// `mesher_cap_mib`; the unit-count mesh cap derives from the fine
    /// slack.
    pub mesher_spare: u64,

    /// Byte cap of the coarse queue in MiB, used when `by_size` is set.
    pub coarse_cap_mib: u64,

    /// Byte cap of each fine queue in MiB, used when `by_size` is set.
    pub bucket_cap_mib: u64,

    /// Byte cap of the mesh queue in MiB, used when `by_size` is set.
    pub mesher_cap_mib: u64,

    /// Bind fine output to device instances through a shared slot-token
    /// queue instead of per-device bounded queues.
    pub slot_queue: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            by_size: false,
            infinite: false,
            bucket_threads: 2,
            gpus: 1,
            coarse_spare: 1,
            bucket_spare: 6,
            mesher_spare: 8,
            coarse_cap_mib: 2 * 1024,
            bucket_cap_mib: 512,
            mesher_cap_mib: 256,
            slot_queue: false,
        }
    }
}

impl ReplayConfig {
    /// Pool capacities of the coarse, fine and mesh queues.
    fn capacities(&self) -> (u64, u64, u64) {
        let fine_spare = self.bucket_spare.max(self.bucket_threads as u64);
        if self.infinite {
            (UNBOUNDED, UNBOUNDED, UNBOUNDED)
        } else if self.by_size {
            (
                self.coarse_cap_mib * MIB,
                self.bucket_cap_mib * MIB,
                self.mesher_cap_mib * MIB,
            )
        } else {
            (
                self.bucket_threads as u64 + self.coarse_spare,
                1 + fine_spare,
                self.gpus as u64 * (1 + fine_spare),
            )
        }
    }

    fn discipline(&self) -> Discipline {
        if self.by_size {
            Discipline::InOrder
        } else {
            Discipline::Unordered
        }
    }
}

/// The assembled pipeline, ready to replay one demand tree.
pub struct Pipeline {
    entity: Rc<Entity>,
    roster: Rc<Roster>,
    seed: Rc<BoundedQueue<Payload>>,
}

impl Pipeline {
    /// Wire the queues and workers for the given configuration and
    /// register every worker with the engine.
    pub fn build(engine: &Engine, config: &ReplayConfig) -> Result<Self, SimError> {
        if config.slot_queue && (config.by_size || config.infinite) {
            return sim_error!("The slot-queue binding requires unit-count capacities");
        }

        let entity = Rc::new(Entity::new(engine.top(), "pipeline"));
        let roster = Rc::new(Roster::new());
        let discipline = config.discipline();
        let (coarse_cap, fine_cap, mesher_cap) = config.capacities();

        info!(entity ;
            "Building pipeline: {} fine workers, {} devices, caps coarse={} fine={} mesher={}",
            config.bucket_threads, config.gpus, coarse_cap, fine_cap, mesher_cap,
        );

        let seed: Rc<BoundedQueue<Payload>> = Rc::new(BoundedQueue::new(1, discipline));
        let coarse_queue: Rc<BoundedQueue<Payload>> =
            Rc::new(BoundedQueue::new(coarse_cap, discipline));
        let mesh_queue: Rc<BoundedQueue<Payload>> =
            Rc::new(BoundedQueue::new(mesher_cap, discipline));

        Worker::new_and_register(
            engine,
            &entity,
            &roster,
            "coarse",
            None,
            seed.clone(),
            vec![coarse_queue.clone() as Rc<dyn StageOut<Payload>>],
            config.by_size,
        );

        // The fine -> device binding: either one bounded queue per device,
        // or one shared slot-token queue with a sub-queue per device.
        let mut device_inputs: Vec<Rc<dyn StageIn<Payload>>> = Vec::new();
        let fine_outputs: Vec<Rc<dyn StageOut<Payload>>> = if config.slot_queue {
            let fine_queue: Rc<SlotQueue<Payload>> =
                Rc::new(SlotQueue::new(fine_cap as usize, config.gpus));
            for index in 0..config.gpus {
                device_inputs.push(Rc::new(fine_queue.subqueue(index)));
            }
            vec![fine_queue as Rc<dyn StageOut<Payload>>]
        } else {
            let mut outputs: Vec<Rc<dyn StageOut<Payload>>> = Vec::new();
            for _ in 0..config.gpus {
                let fine_queue: Rc<BoundedQueue<Payload>> =
                    Rc::new(BoundedQueue::new(fine_cap, discipline));
                device_inputs.push(fine_queue.clone());
                outputs.push(fine_queue);
            }
            outputs
        };

        for index in 0..config.bucket_threads {
            Worker::new_and_register(
                engine,
                &entity,
                &roster,
                "fine",
                Some(index),
                coarse_queue.clone(),
                fine_outputs.clone(),
                config.by_size,
            );
        }

        for (index, device_input) in device_inputs.into_iter().enumerate() {
            Worker::new_and_register(
                engine,
                &entity,
                &roster,
                "device",
                Some(index),
                device_input,
                vec![mesh_queue.clone() as Rc<dyn StageOut<Payload>>],
                config.by_size,
            );
        }

        Worker::new_and_register(
            engine,
            &entity,
            &roster,
            "mesher",
            None,
            mesh_queue.clone(),
            Vec::new(),
            config.by_size,
        );

        Ok(Self {
            entity,
            roster,
            seed,
        })
    }

    /// Seed the pipeline with the demand tree and a shutdown marker, drain
    /// the event queue and return the makespan.
    ///
    /// If any worker is still registered as running once no event remains,
    /// the run deadlocked: every stalled worker is reported and the run
    /// fails.
    pub fn run(&self, engine: &mut Engine, root: Rc<DemandNode>) -> Result<f64, SimError> {
        self.seed.push_back(Payload::Item(root));
        self.seed.push_back(Payload::Shutdown);

        engine.run()?;

        if !self.roster.is_empty() {
            let stalled = self.roster.stalled();
            for name in &stalled {
                error!(self.entity ; "Worker {name} still running");
            }
            return sim_error!(
                "Workers still running: possible deadlock: {}",
                stalled.join(", ")
            );
        }

        Ok(engine.time_now())
    }
}
