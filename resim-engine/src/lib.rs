// Copyright (c) 2026 The resim developers. All rights reserved.

// Enable warnings for missing documentation
// TODO: document the remaining public items in executor and enable this
// crate-wide.
// #![warn(missing_docs)]

#![doc(test(attr(warn(unused))))]

//! The resim engine.
//!
//! This library provides the core of the [engine](crate::engine) which
//! executes event driven asynchronous simulation components.
//!
//! Execution is single-threaded and cooperative: components are plain
//! `async` functions which suspend at three kinds of points only - waiting
//! to pop an empty queue, waiting to acquire pool capacity, and a timed
//! sleep on the [`Timer`](crate::time::Timer). The engine resumes exactly
//! one task per event, so all state mutation between suspension points is
//! atomic relative to simulated time and no locking is needed.
//!
//! # Simple Application
//!
//! A very simple application would look like:
//!
//! ```rust
//! use resim_engine::engine::Engine;
//!
//! let mut engine = Engine::default();
//! let timer = engine.timer();
//! engine.spawn(async move {
//!     timer.sleep(2.5).await;
//!     Ok(())
//! });
//! engine.run().unwrap();
//! assert_eq!(engine.time_now(), 2.5);
//! ```

pub mod engine;
pub mod executor;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;

#[macro_export]
/// Spawn all registered component run() functions and then run the
/// simulation.
macro_rules! run_simulation {
    ($engine:ident) => {
        $engine.run().unwrap();
    };
    ($engine:ident, $expect:expr) => {
        match $engine.run() {
            Ok(()) => panic!("Expected an error!"),
            Err(e) => assert_eq!(format!("{e}").as_str(), $expect),
        }
    };
}
