// Copyright (c) 2026 The resim developers. All rights reserved.

//! A capacity-bounded arena allocator.
//!
//! The [`Pool`] models a fixed-size memory arena from which contiguous
//! ranges are granted to requesters. Requests are served in strict arrival
//! order: a request that cannot be granted blocks every later request on
//! the same pool, even smaller ones that would individually fit. This
//! reproduces the admission behaviour of the real pipeline's allocators.
//!
//! Two disciplines are supported, see [`Discipline`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use resim_engine::sim_error;
use resim_engine::types::{SimError, SimResult};

/// Admission discipline of a [`Pool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Discipline {
    /// Ring-buffer semantics: outstanding ranges are kept in acquisition
    /// order and a grant that does not fit after the newest range wraps to
    /// offset 0. Only valid when releases also occur in acquisition order,
    /// which holds because an in-order pool is paired 1:1 with a FIFO queue
    /// whose consumers release in delivery order.
    InOrder,

    /// Admission gated purely by aggregate spare capacity. New ranges are
    /// appended after the most recent one with no wraparound bookkeeping;
    /// relative position is not meaningful under this discipline, only the
    /// total outstanding size matters.
    Unordered,
}

/// A granted contiguous range `[start, end)` within a pool's arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
}

impl Region {
    /// Size of the range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

struct Waiter {
    size: u64,
    slot: Rc<RefCell<Option<Region>>>,
    waker: Waker,
}

struct PoolState {
    capacity: u64,
    discipline: Discipline,

    /// Total capacity not currently granted.
    spare: u64,

    /// Outstanding ranges in acquisition order.
    allocs: VecDeque<Region>,

    /// Requests that have not been granted yet, in arrival order.
    waiters: VecDeque<Waiter>,
}

impl PoolState {
    /// Maximum possible allocation without blocking.
    fn biggest(&self) -> u64 {
        match self.discipline {
            Discipline::Unordered => self.spare,
            Discipline::InOrder => {
                if self.allocs.is_empty() {
                    self.capacity
                } else {
                    // The occupied arc runs from the oldest range's start to
                    // the newest range's end.
                    let start = self.allocs.front().unwrap().start;
                    let end = self.allocs.back().unwrap().end;
                    if end > start {
                        (self.capacity - end).max(start)
                    } else {
                        start - end
                    }
                }
            }
        }
    }

    /// Grant queued requests head to tail, stopping at the first one that
    /// still cannot be satisfied.
    fn grant_waiters(&mut self) {
        while let Some(head) = self.waiters.front() {
            if head.size > self.biggest() {
                break;
            }

            let size = head.size;
            let start = if self.allocs.is_empty() {
                0
            } else {
                match self.discipline {
                    Discipline::Unordered => self.allocs.back().unwrap().end,
                    Discipline::InOrder => {
                        let end = self.allocs.back().unwrap().end;
                        if self.capacity - end >= size {
                            end
                        } else {
                            // Wrap to the front of the arena
                            0
                        }
                    }
                }
            };

            let region = Region {
                start,
                end: start + size,
            };
            self.allocs.push_back(region);
            self.spare -= size;

            let waiter = self.waiters.pop_front().unwrap();
            *waiter.slot.borrow_mut() = Some(region);
            waiter.waker.wake();
        }
    }
}

/// A capacity-bounded allocator of contiguous ranges.
#[derive(Clone)]
pub struct Pool {
    shared_state: Rc<RefCell<PoolState>>,
}

impl Pool {
    /// Create a pool with the given arena capacity and [`Discipline`].
    #[must_use]
    pub fn new(capacity: u64, discipline: Discipline) -> Self {
        Self {
            shared_state: Rc::new(RefCell::new(PoolState {
                capacity,
                discipline,
                spare: capacity,
                allocs: VecDeque::new(),
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Capacity not currently granted.
    #[must_use]
    pub fn spare(&self) -> u64 {
        self.shared_state.borrow().spare
    }

    /// Total arena capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.shared_state.borrow().capacity
    }

    /// Request a range of `size`. Resolves once the request reaches the
    /// head of the queue and fits.
    ///
    /// A size of zero or greater than the pool capacity is a contract
    /// violation and resolves immediately to an error.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn acquire(&self, size: u64) -> Acquire {
        Acquire {
            shared_state: self.shared_state.clone(),
            size,
            slot: Rc::new(RefCell::new(None)),
            queued: false,
        }
    }

    /// Return a previously granted range, then grant as many queued
    /// requests as now fit.
    ///
    /// Releasing a range that is not outstanding is a contract violation.
    pub fn release(&self, region: Region) -> SimResult {
        let mut state = self.shared_state.borrow_mut();
        match state.allocs.iter().position(|r| *r == region) {
            Some(index) => {
                state.allocs.remove(index);
            }
            None => {
                return sim_error!(
                    "Release of a range [{}, {}) that was never granted",
                    region.start,
                    region.end
                );
            }
        }
        state.spare += region.len();
        state.grant_waiters();
        Ok(())
    }
}

/// Future returned by [`Pool::acquire`].
pub struct Acquire {
    shared_state: Rc<RefCell<PoolState>>,
    size: u64,
    slot: Rc<RefCell<Option<Region>>>,
    queued: bool,
}

impl Future for Acquire {
    type Output = Result<Region, SimError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.queued {
            {
                let state = self.shared_state.borrow();
                if self.size == 0 || self.size > state.capacity {
                    return Poll::Ready(sim_error!(
                        "Request for {} units from a pool of capacity {}",
                        self.size,
                        state.capacity
                    ));
                }
            }

            // Even an immediately satisfiable request goes through the
            // queue so that it cannot overtake an earlier one.
            let mut state = self.shared_state.borrow_mut();
            state.waiters.push_back(Waiter {
                size: self.size,
                slot: self.slot.clone(),
                waker: cx.waker().clone(),
            });
            state.grant_waiters();
            drop(state);
            self.queued = true;
        } else if self.slot.borrow().is_none() {
            // Spurious poll: refresh the stored waker
            let mut state = self.shared_state.borrow_mut();
            if let Some(waiter) = state
                .waiters
                .iter_mut()
                .find(|w| Rc::ptr_eq(&w.slot, &self.slot))
            {
                waiter.waker = cx.waker().clone();
            }
        }

        match self.slot.borrow_mut().take() {
            Some(region) => Poll::Ready(Ok(region)),
            None => Poll::Pending,
        }
    }
}
