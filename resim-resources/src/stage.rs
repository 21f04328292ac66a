// Copyright (c) 2026 The resim developers. All rights reserved.

//! The channel types that connect pipeline stages.
//!
//! A stage queue has two ends. The producer end ([`StageOut`]) is where a
//! worker reserves capacity for a work item and hands the item over; the
//! consumer end ([`StageIn`]) is where the next stage's worker takes items
//! out and, once finished with one, returns its capacity.
//!
//! Two implementations exist:
//!   - [`BoundedQueue`]: one [`Pool`] for backpressure plus one [`Fifo`]
//!     for ordering. Implements both ends.
//!   - [`SlotQueue`]: a shared pool of interchangeable slot tokens feeding
//!     several independent sub-queues, modelling binding to one of several
//!     identical physical resources for the duration of an item's dwell in
//!     the stage. The shared queue is the producer end; each
//!     [`SlotSubQueue`] is a consumer end.

use async_trait::async_trait;

use resim_engine::sim_error;
use resim_engine::types::{SimError, SimResult};

use crate::fifo::Fifo;
use crate::pool::{Discipline, Pool, Region};

/// An opaque handle for granted stage capacity.
///
/// Owned by the worker that acquired it (carried on the work item) until
/// the consuming stage calls [`StageIn::done`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Grant {
    /// A range within a [`Pool`] arena.
    Region(Region),

    /// A slot token naming one of a [`SlotQueue`]'s sub-queues.
    Slot(usize),
}

/// The consumer end of a stage queue.
#[async_trait(?Send)]
pub trait StageIn<T> {
    /// Take the oldest payload, waiting for one if none is queued.
    async fn pop(&self) -> T;

    /// Hand a payload back to this queue, to be popped again later. Used to
    /// pass the shutdown marker between sibling workers of one stage.
    fn push_back(&self, value: T);

    /// Return the capacity that was granted for a payload when it entered
    /// this stage.
    fn done(&self, grant: Grant) -> SimResult;
}

/// The producer end of a stage queue.
#[async_trait(?Send)]
pub trait StageOut<T> {
    /// Capacity that could be granted right now without waiting. Used by
    /// workers to load-balance across several candidate outputs.
    fn spare(&self) -> u64;

    /// Reserve capacity for a payload of `size`, waiting for it to become
    /// available.
    async fn get(&self, size: u64) -> Result<Grant, SimError>;

    /// Hand a payload over. `grant` must be the handle returned by
    /// [`get`](StageOut::get) for this payload, or `None` when seeding
    /// control payloads that reserved no capacity.
    fn push(&self, value: T, grant: Option<Grant>) -> SimResult;
}

/// A stage queue composing a [`Pool`] (backpressure) with a [`Fifo`]
/// (ordering).
pub struct BoundedQueue<T> {
    pool: Pool,
    fifo: Fifo<T>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue whose pool has the given capacity and discipline.
    #[must_use]
    pub fn new(capacity: u64, discipline: Discipline) -> Self {
        Self {
            pool: Pool::new(capacity, discipline),
            fifo: Fifo::new(),
        }
    }
}

#[async_trait(?Send)]
impl<T> StageIn<T> for BoundedQueue<T> {
    async fn pop(&self) -> T {
        self.fifo.pop().await
    }

    fn push_back(&self, value: T) {
        self.fifo.push(value);
    }

    fn done(&self, grant: Grant) -> SimResult {
        match grant {
            Grant::Region(region) => self.pool.release(region),
            Grant::Slot(token) => {
                sim_error!("Slot token {token} returned to a pool-bounded queue")
            }
        }
    }
}

#[async_trait(?Send)]
impl<T> StageOut<T> for BoundedQueue<T> {
    fn spare(&self) -> u64 {
        self.pool.spare()
    }

    async fn get(&self, size: u64) -> Result<Grant, SimError> {
        let region = self.pool.acquire(size).await?;
        Ok(Grant::Region(region))
    }

    fn push(&self, value: T, _grant: Option<Grant>) -> SimResult {
        self.fifo.push(value);
        Ok(())
    }
}

/// A stage queue backed by interchangeable slot tokens.
///
/// Holds `slots_per_queue x num_queues` tokens: `slots_per_queue` copies of
/// each of the `num_queues` token identities, seeded round-robin so that
/// early grants spread across the sub-queues.
pub struct SlotQueue<T> {
    tokens: Fifo<usize>,
    queues: Vec<Fifo<T>>,
}

impl<T> SlotQueue<T> {
    /// Create the shared token pool and `num_queues` sub-queues.
    #[must_use]
    pub fn new(slots_per_queue: usize, num_queues: usize) -> Self {
        let tokens = Fifo::new();
        for _ in 0..slots_per_queue {
            for idx in 0..num_queues {
                tokens.push(idx);
            }
        }
        Self {
            tokens,
            queues: (0..num_queues).map(|_| Fifo::new()).collect(),
        }
    }

    /// The consumer end bound to sub-queue `idx`.
    #[must_use]
    pub fn subqueue(&self, idx: usize) -> SlotSubQueue<T> {
        SlotSubQueue {
            tokens: self.tokens.clone(),
            queue: self.queues[idx].clone(),
            idx,
        }
    }
}

#[async_trait(?Send)]
impl<T> StageOut<T> for SlotQueue<T>
where
    T: Clone,
{
    fn spare(&self) -> u64 {
        self.tokens.len() as u64
    }

    /// A slot holds exactly one item whatever its size, so `size` does not
    /// take part in admission.
    async fn get(&self, _size: u64) -> Result<Grant, SimError> {
        let token = self.tokens.pop().await;
        Ok(Grant::Slot(token))
    }

    fn push(&self, value: T, grant: Option<Grant>) -> SimResult {
        match grant {
            Some(Grant::Slot(idx)) => match self.queues.get(idx) {
                Some(queue) => {
                    queue.push(value);
                    Ok(())
                }
                None => sim_error!("Slot token {idx} does not name a sub-queue"),
            },
            Some(Grant::Region(_)) => {
                sim_error!("Pool range pushed to a slot-bounded queue")
            }
            None => {
                // Control payloads fan out to every sub-queue
                for queue in &self.queues {
                    queue.push(value.clone());
                }
                Ok(())
            }
        }
    }
}

/// The consumer end of one of a [`SlotQueue`]'s sub-queues.
pub struct SlotSubQueue<T> {
    tokens: Fifo<usize>,
    queue: Fifo<T>,
    idx: usize,
}

#[async_trait(?Send)]
impl<T> StageIn<T> for SlotSubQueue<T> {
    async fn pop(&self) -> T {
        self.queue.pop().await
    }

    fn push_back(&self, value: T) {
        self.queue.push(value);
    }

    fn done(&self, grant: Grant) -> SimResult {
        match grant {
            Grant::Slot(_) => {
                self.tokens.push(self.idx);
                Ok(())
            }
            Grant::Region(region) => {
                sim_error!(
                    "Pool range [{}, {}) returned to a slot sub-queue",
                    region.start,
                    region.end
                )
            }
        }
    }
}
