// Copyright (c) 2026 The resim developers. All rights reserved.

//! This module represents the time during a simulation.
//!
//! Time is a plain `f64` in the units of the recorded trace (seconds). The
//! [`Timer`] owns the queue of tasks waiting for a future time; the
//! [executor](crate::executor) drains it whenever no task is runnable.
//!
//! Tasks that share a wake-up time are resumed in the order in which they
//! were scheduled. This makes runs reproducible: there is no hidden
//! comparison of task identities to break ties.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use resim_track::entity::Entity;
use resim_track::set_time;

/// Shared state between [`Sleep`] futures using a [`Timer`] and the Timer
/// itself.
pub struct TimerState {
    entity: Rc<Entity>,

    now: Cell<f64>,

    /// Times at which futures are to be woken. This is kept sorted in
    /// descending order so that the last entry is the next to be woken.
    waiting_times: RefCell<Vec<f64>>,

    /// Queue of futures waiting for the right time, one list per entry in
    /// `waiting_times`. Within a list, wakers are stored in scheduling
    /// order.
    waiting: RefCell<Vec<Vec<Waker>>>,
}

impl TimerState {
    fn schedule(&self, schedule_time: f64, cx: &mut Context<'_>) {
        let mut waiting_times = self.waiting_times.borrow_mut();
        let mut waiting = self.waiting.borrow_mut();
        if let Some(index) = waiting_times.iter().position(|&x| x == schedule_time) {
            // Time already exists, add this task behind the earlier ones
            waiting[index].push(cx.waker().clone());
        } else {
            // Time not found, insert at the correct location
            match waiting_times.iter().position(|x| *x < schedule_time) {
                Some(index) => {
                    waiting_times.insert(index, schedule_time);
                    waiting.insert(index, vec![cx.waker().clone()]);
                }
                None => {
                    waiting_times.push(schedule_time);
                    waiting.push(vec![cx.waker().clone()]);
                }
            };
        }
    }
}

/// Handle on the simulation time.
///
/// The handle can be cloned into every task that needs to [`sleep`](Timer::sleep)
/// or read the current time.
#[derive(Clone)]
pub struct Timer {
    pub(crate) shared_state: Rc<TimerState>,
}

impl Timer {
    /// Create a new [`Timer`] starting at time zero.
    #[must_use]
    pub fn new(parent: &Rc<Entity>) -> Self {
        Self {
            shared_state: Rc::new(TimerState {
                entity: Rc::new(Entity::new(parent, "time")),
                now: Cell::new(0.0),
                waiting_times: RefCell::new(Vec::new()),
                waiting: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Returns the current simulated time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.shared_state.now.get()
    }

    /// Returns a [`Sleep`] future which must be `await`ed to suspend the
    /// calling task for `duration` time units.
    ///
    /// A zero duration still suspends the task until the next scheduling
    /// round at the current time.
    ///
    /// **Panics** if `duration` is negative: recorded latencies and compute
    /// times can never be negative, so a negative duration indicates a
    /// corrupted demand tree.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn sleep(&self, duration: f64) -> Sleep {
        assert!(duration >= 0.0, "Sleep duration must not be negative");
        Sleep {
            shared_state: self.shared_state.clone(),
            until: self.now() + duration,
            state: SleepState::Pending,
        }
    }

    /// Advance to the next pending wake-up time and return the tasks to be
    /// woken, soonest first. Returns `None` when nothing is waiting.
    pub(crate) fn advance(&self) -> Option<Vec<Waker>> {
        let next_time = self.shared_state.waiting_times.borrow_mut().pop()?;
        if next_time != self.shared_state.now.get() {
            assert!(
                next_time >= self.shared_state.now.get(),
                "Time moving backwards"
            );
            set_time!(self.shared_state.entity ; next_time);
            self.shared_state.now.set(next_time);
        }
        self.shared_state.waiting.borrow_mut().pop()
    }
}

/// Possible states of a [`Sleep`].
enum SleepState {
    Pending,
    Running,
}

/// Future returned by the timer to manage advancing time using async
/// functions.
pub struct Sleep {
    shared_state: Rc<TimerState>,
    until: f64,
    state: SleepState,
}

impl Future for Sleep {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.state {
            SleepState::Pending => {
                self.shared_state.schedule(self.until, cx);
                self.state = SleepState::Running;
                Poll::Pending
            }
            SleepState::Running => {
                assert!(self.shared_state.now.get() >= self.until);
                Poll::Ready(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use resim_track::entity::toplevel;
    use resim_track::tracker::dev_null_tracker;

    use super::*;

    fn test_timer() -> Timer {
        let tracker = dev_null_tracker();
        let top = toplevel(&tracker, "top");
        Timer::new(&top)
    }

    #[test]
    fn starts_at_zero() {
        let timer = test_timer();
        assert_eq!(timer.now(), 0.0);
    }

    #[test]
    fn advance_empty() {
        let timer = test_timer();
        assert!(timer.advance().is_none());
    }

    #[test]
    #[should_panic]
    fn negative_sleep() {
        let timer = test_timer();
        let _ = timer.sleep(-1.0);
    }

    #[test]
    fn waiting_times_sorted_descending() {
        let timer = test_timer();
        let state = Rc::clone(&timer.shared_state);

        // Build a context from a no-op waker just to exercise scheduling.
        let waker = futures_noop_waker();
        let mut cx = Context::from_waker(&waker);
        state.schedule(5.0, &mut cx);
        state.schedule(1.0, &mut cx);
        state.schedule(3.0, &mut cx);
        state.schedule(1.0, &mut cx);

        assert_eq!(*state.waiting_times.borrow(), vec![5.0, 3.0, 1.0]);
        assert_eq!(state.waiting.borrow().last().unwrap().len(), 2);
    }

    fn futures_noop_waker() -> Waker {
        use std::task::{RawWaker, RawWakerVTable};
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }
}
