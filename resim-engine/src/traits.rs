// Copyright (c) 2026 The resim developers. All rights reserved.

//! A set of common traits used across the resim engine.

use async_trait::async_trait;

use crate::types::SimResult;

/// A component that has a single long-running `run` task.
///
/// Components implementing [`Runnable`] can be registered with the
/// [`Engine`](crate::engine::Engine) so that their `run` future is spawned
/// when the simulation starts.
#[async_trait(?Send)]
pub trait Runnable {
    /// The component's main loop.
    async fn run(&self) -> SimResult;
}
