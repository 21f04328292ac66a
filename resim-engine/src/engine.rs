// Copyright (c) 2026 The resim developers. All rights reserved.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use resim_track::entity::{Entity, toplevel};
use resim_track::tracker::stdout_tracker;
use resim_track::{Tracker, trace};

use crate::executor::{self, Executor, Spawner};
use crate::time::Timer;
use crate::types::{Component, SimResult};

/// Holds the components to be spawned when the simulation starts.
pub struct Registry {
    pub entity: Rc<Entity>,
    components: RefCell<Vec<Component>>,
}

impl Registry {
    fn new(parent: &Rc<Entity>) -> Self {
        Self {
            entity: Rc::new(Entity::new(parent, "registry")),
            components: RefCell::new(Vec::new()),
        }
    }

    pub fn spawn_components(&self, spawner: &Spawner) {
        let mut guard = self.components.borrow_mut();

        trace!(self.entity ; "Spawning {} components", guard.len());

        for component in guard.drain(..) {
            spawner.spawn(async move { component.run().await });
        }
    }

    pub fn register(&self, component: Component) {
        let mut guard = self.components.borrow_mut();
        guard.push(component);
    }
}

/// The facade every simulation is built around.
///
/// Owns the executor, the spawner, the component registry, the top-level
/// [`Entity`] and the [`Tracker`].
pub struct Engine {
    pub executor: Executor,
    spawner: Spawner,
    toplevel: Rc<Entity>,
    tracker: Tracker,
    registry: Registry,
}

impl Engine {
    /// Create a standalone engine.
    pub fn new(tracker: &Tracker) -> Self {
        let toplevel = toplevel(tracker, "top");
        let (executor, spawner) = executor::new_executor_and_spawner(&toplevel);
        let registry = Registry::new(&toplevel);
        Self {
            executor,
            spawner,
            toplevel,
            tracker: tracker.clone(),
            registry,
        }
    }

    /// Register a component that will be run as the simulation starts
    pub fn register(&self, component: Component) {
        self.registry.register(component);
    }

    /// Spawn all registered components and drain the event queue.
    pub fn run(&mut self) -> SimResult {
        self.registry.spawn_components(&self.spawner);
        self.executor.run()
    }

    #[must_use]
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.spawner.spawn(future);
    }

    #[must_use]
    pub fn timer(&self) -> Timer {
        self.executor.timer()
    }

    #[must_use]
    pub fn time_now(&self) -> f64 {
        self.executor.time_now()
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }
}

/// Create a default engine that sends track events to stdout.
///
/// This is provided to keep documentation examples simple with fewer
/// concepts to have to consider at once.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(log::Level::Info);
        Self::new(&tracker)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The tracker can be using a buffered writer and so it needs to be
        // shut down cleanly to ensure that it is flushed properly.
        self.tracker.shutdown();
    }
}
