// Copyright (c) 2026 The resim developers. All rights reserved.

//! A blocking first-in first-out handoff queue.
//!
//! [`Fifo`] accepts payloads with a synchronous [`push`](Fifo::push) and
//! hands them out through an awaitable [`pop`](Fifo::pop). Payloads are
//! delivered in exactly the order they were pushed, matched to waiting
//! consumers in their registration order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct Waiter<T> {
    slot: Rc<RefCell<Option<T>>>,
    waker: Waker,
}

struct FifoState<T> {
    queue: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
}

impl<T> FifoState<T> {
    /// Match queued payloads to waiting consumers, oldest to oldest.
    fn deliver(&mut self) {
        while !self.waiters.is_empty() && !self.queue.is_empty() {
            let value = self.queue.pop_front().unwrap();
            let waiter = self.waiters.pop_front().unwrap();
            *waiter.slot.borrow_mut() = Some(value);
            waiter.waker.wake();
        }
    }
}

/// A blocking FIFO queue of opaque payloads.
pub struct Fifo<T> {
    shared_state: Rc<RefCell<FifoState<T>>>,
}

impl<T> Clone for Fifo<T> {
    fn clone(&self) -> Self {
        Self {
            shared_state: self.shared_state.clone(),
        }
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Fifo<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared_state: Rc::new(RefCell::new(FifoState {
                queue: VecDeque::new(),
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Append a payload, delivering it at once if a consumer is waiting.
    pub fn push(&self, value: T) {
        let mut state = self.shared_state.borrow_mut();
        state.queue.push_back(value);
        state.deliver();
    }

    /// Take the oldest payload, waiting for one to arrive if the queue is
    /// empty.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn pop(&self) -> Pop<T> {
        Pop {
            shared_state: self.shared_state.clone(),
            slot: Rc::new(RefCell::new(None)),
            queued: false,
        }
    }

    /// Number of payloads currently queued and not yet claimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared_state.borrow().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared_state.borrow().queue.is_empty()
    }
}

/// Future returned by [`Fifo::pop`].
pub struct Pop<T> {
    shared_state: Rc<RefCell<FifoState<T>>>,
    slot: Rc<RefCell<Option<T>>>,
    queued: bool,
}

impl<T> Future for Pop<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.queued {
            let mut state = self.shared_state.borrow_mut();
            state.waiters.push_back(Waiter {
                slot: self.slot.clone(),
                waker: cx.waker().clone(),
            });
            state.deliver();
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
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}
