// Copyright (c) 2026 The resim developers. All rights reserved.

//! The single-threaded cooperative executor.
//!
//! Tasks are plain futures held behind [`Rc`]. A task's waker pushes the
//! task back onto the run queue; the executor never polls a task that has
//! not been woken. When the run queue drains, the executor asks the
//! [`Timer`](crate::time::Timer) for the next wake-up time and resumes the
//! tasks scheduled there, in scheduling order.

use std::cell::RefCell;
use std::future::Future;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use resim_track::entity::Entity;

use crate::time::Timer;
use crate::types::SimResult;

static VTABLE: RawWakerVTable = RawWakerVTable::new(
    clone_raw_waker,
    wake_raw_waker,
    wake_by_ref_raw_waker,
    drop_raw_waker,
);

fn raw_waker_for(task: Rc<Task>) -> RawWaker {
    RawWaker::new(Rc::into_raw(task) as *const (), &VTABLE)
}

fn waker_for_task(task: Rc<Task>) -> Waker {
    unsafe { Waker::from_raw(raw_waker_for(task)) }
}

// Each raw waker owns one strong reference to its task. Cloning takes a new
// reference, waking transfers the reference to the run queue and dropping
// releases it.

unsafe fn clone_raw_waker(data: *const ()) -> RawWaker {
    let task = ManuallyDrop::new(unsafe { Rc::from_raw(data as *const Task) });
    raw_waker_for(Rc::clone(&task))
}

unsafe fn wake_raw_waker(data: *const ()) {
    let task = unsafe { Rc::from_raw(data as *const Task) };
    let cloned = task.clone();
    task.executor_state.new_tasks.borrow_mut().push(cloned);
}

unsafe fn wake_by_ref_raw_waker(data: *const ()) {
    let task = ManuallyDrop::new(unsafe { Rc::from_raw(data as *const Task) });
    let cloned = Rc::clone(&task);
    task.executor_state.new_tasks.borrow_mut().push(cloned);
}

unsafe fn drop_raw_waker(data: *const ()) {
    drop(unsafe { Rc::from_raw(data as *const Task) });
}

struct Task {
    future: RefCell<Pin<Box<dyn Future<Output = SimResult>>>>,
    executor_state: Rc<ExecutorState>,
}

impl Task {
    fn new(
        future: impl Future<Output = SimResult> + 'static,
        executor_state: Rc<ExecutorState>,
    ) -> Task {
        Task {
            future: RefCell::new(Box::pin(future)),
            executor_state,
        }
    }

    fn poll(&self, context: &mut Context) -> Poll<SimResult> {
        self.future.borrow_mut().as_mut().poll(context)
    }
}

struct ExecutorState {
    task_queue: RefCell<Vec<Rc<Task>>>,
    new_tasks: RefCell<Vec<Rc<Task>>>,
    timer: Timer,
}

impl ExecutorState {
    fn new(top: &Rc<Entity>) -> Self {
        Self {
            task_queue: RefCell::new(Vec::new()),
            new_tasks: RefCell::new(Vec::new()),
            timer: Timer::new(top),
        }
    }
}

/// Single-threaded executor
///
/// This is a thin wrapper (using [`Rc`]) around the real executor state, so
/// that this struct can be cloned and passed around.
#[derive(Clone)]
pub struct Executor {
    state: Rc<ExecutorState>,
}

impl Executor {
    /// Add a new task to be run.
    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.state
            .new_tasks
            .borrow_mut()
            .push(Rc::new(Task::new(future, self.state.clone())));
    }

    /// Run until no task is runnable and no wake-up is pending.
    ///
    /// Tasks that are still parked on a queue or pool when the run loop
    /// exits are simply dropped with the executor; detecting whether that
    /// amounts to a deadlock is the caller's responsibility.
    pub fn run(&self) -> SimResult {
        loop {
            self.step()?;

            if self.state.new_tasks.borrow().is_empty() {
                if let Some(wakers) = self.state.timer.advance() {
                    // No runnable task left, advance time
                    for waker in wakers.into_iter() {
                        waker.wake();
                    }
                } else {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Poll every task woken since the last step, in wake order.
    fn step(&self) -> SimResult {
        // Append tasks woken since the last step into the task queue
        let mut task_queue = self.state.task_queue.borrow_mut();
        task_queue.append(&mut self.state.new_tasks.borrow_mut());

        for task in task_queue.drain(..) {
            let waker = waker_for_task(task.clone());
            let mut context = Context::from_waker(&waker);

            match task.poll(&mut context) {
                Poll::Ready(Err(e)) => {
                    // Error - return early
                    return Err(e);
                }
                Poll::Ready(Ok(())) => {
                    // Task is complete, drop it
                }
                Poll::Pending => {
                    // Task will have parked itself waiting somewhere
                }
            }
        }
        Ok(())
    }

    /// Handle on the simulation [`Timer`].
    #[must_use]
    pub fn timer(&self) -> Timer {
        self.state.timer.clone()
    }

    /// Returns the current simulated time.
    #[must_use]
    pub fn time_now(&self) -> f64 {
        self.state.timer.now()
    }
}

/// `Spawner` spawns new futures into the executor.
#[derive(Clone)]
pub struct Spawner {
    state: Rc<ExecutorState>,
}

impl Spawner {
    /// Add a new task to be run.
    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.state
            .new_tasks
            .borrow_mut()
            .push(Rc::new(Task::new(future, self.state.clone())));
    }
}

/// Create a connected [`Executor`] and [`Spawner`] pair.
pub fn new_executor_and_spawner(top: &Rc<Entity>) -> (Executor, Spawner) {
    let state = Rc::new(ExecutorState::new(top));
    (
        Executor {
            state: state.clone(),
        },
        Spawner { state },
    )
}
