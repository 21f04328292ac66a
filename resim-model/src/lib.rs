// Copyright (c) 2026 The resim developers. All rights reserved.

//! The replay model of the reconstruction pipeline.
//!
//! A recorded run of the real pipeline is loaded as a [`Trace`](trace::Trace),
//! reconstructed into a [demand tree](demand) and then replayed by
//! [workers](worker) through a [`Pipeline`](pipeline::Pipeline) of stage
//! queues whose capacities are set by a
//! [`ReplayConfig`](pipeline::ReplayConfig). The result of a run is the
//! makespan: the simulated time at which the last worker terminates.
//!
//! The recorded trace carries, for every work item the real run handled,
//! how long the item's producer waited to dequeue its own input
//! (`parent_get`), how long it waited to hand the item downstream
//! (`parent_push`) and how much compute time it spent on the item after the
//! last handoff (`finish`). Replaying those delays against differently
//! sized queues and worker counts answers what the run's makespan would
//! have been under that configuration.

pub mod demand;
pub mod pipeline;
pub mod roster;
pub mod trace;
pub mod worker;
