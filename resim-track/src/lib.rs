// Copyright (c) 2026 The resim developers. All rights reserved.

//! This module provides combined _track_ capabilities for the resim project.
//!
//! _Track_ means the combination of _log_ and _trace_ where:
//!
//!   - _log_ are text-based human-readable messages emitted at various levels
//!     of verbosity (from `Trace` through to `Error`).
//!   - _trace_ provides a standard set of modelling events. For example,
//!     work items entering or leaving simulation
//!     [`Entities`](crate::entity::Entity).
//!
//! Every part of a model owns an [`Entity`](crate::entity::Entity) which
//! carries its position in the model hierarchy and the
//! [`Tracker`] that decides, per entity, which events are emitted.

// Enable warnings for missing documentation
#![warn(missing_docs)]

pub use log;

pub mod entity;
pub mod tag;

/// Include the trackers.
pub mod tracker;
pub use tracker::{Track, Tracker};

/// A type alias for objects that receive _log_ / _trace_ events.
pub type Writer = Box<dyn std::io::Write>;

/// Type used for unique tags
///
/// Each _log_/_trace_ event within the application is given a unique tag to
/// identify it. There are two reserved tag values: [NO_ID] and [ROOT].
pub use tag::Tag;

pub mod test_helpers;

/// Tag value which indicates where there is no valid tag
pub const NO_ID: Tag = tag::Tag(0);

/// The root tag from which all other tags are derived
pub const ROOT: Tag = tag::Tag(1);

// Track an enter event.
#[doc(hidden)]
#[macro_export]
macro_rules! enter {
    ($entity:expr ; $enter_tag:expr) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.tag, log::Level::Trace)
        {
            $entity.tracker.enter($entity.tag, $enter_tag);
        }
    };
}

// Track an exit event.
#[doc(hidden)]
#[macro_export]
macro_rules! exit {
    ($entity:expr ; $exit_tag:expr) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.tag, log::Level::Trace)
        {
            $entity.tracker.exit($entity.tag, $exit_tag);
        }
    };
}

/// Create a unique tag for tracking.
///
/// The user must specify an entity with a [`Tracker`] to create the tag.
#[macro_export]
macro_rules! create_tag {
    ($entity:expr) => {{ $entity.tracker.unique_tag() }};
}

/// Update the current simulated time.
///
/// Unlike the event macros this is never filtered: trackers annotate every
/// event with the current time, so they must see every advance.
#[macro_export]
macro_rules! set_time {
    ($entity:expr ; $time:expr) => {{
        $entity.tracker.time($entity.tag, $time);
    }};
}

/// Base macro for log messages of all levels.
///
/// The message is only formatted if the entity has the requested level
/// enabled.
#[macro_export]
macro_rules! log_base {
    ($entity:expr ; $lvl:expr, $($arg:tt)+) => (
        if $entity.tracker.is_entity_enabled($entity.tag, $lvl) {
            $entity.tracker.log($entity.tag, $lvl, format_args!($($arg)+));
        }
    );
}

/// The `trace` macro provides a wrapper for the [`log_base`] macro at level
/// `log::Level::Trace`
#[macro_export]
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Trace, $($arg)+);
    );
}

/// The `debug` macro provides a wrapper for the [`log_base`] macro at level
/// `log::Level::Debug`
#[macro_export]
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Debug, $($arg)+);
    );
}

/// The `info` macro provides a wrapper for the [`log_base`] macro at level
/// `log::Level::Info`
#[macro_export]
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Info, $($arg)+);
    );
}

/// The `warn` macro provides a wrapper for the [`log_base`] macro at level
/// `log::Level::Warn`
#[macro_export]
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Warn, $($arg)+);
    );
}

/// The `error` macro provides a wrapper for the [`log_base`] macro at level
/// `log::Level::Error`
#[macro_export]
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Error, $($arg)+);
    );
}
