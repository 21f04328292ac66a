// Copyright (c) 2026 The resim developers. All rights reserved.

//! Define the [`Track`] trait and a number of [`Tracker`]s.

/// Include the /dev/null tracker.
pub mod dev_null;
/// Include the text-based tracker.
pub mod text;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;

pub use dev_null::DevNullTracker;
use regex::Regex;
pub use text::TextTracker;

use crate::{ROOT, Tag};

/// Error raised when a tracker is misconfigured (for example a malformed
/// entity filter regular expression).
#[derive(Debug)]
pub struct TrackConfigError(pub String);

impl fmt::Display for TrackConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Track configuration error: {}", self.0)
    }
}

impl std::error::Error for TrackConfigError {}

/// This is the interface that is supported by all [`Tracker`]s.
pub trait Track {
    /// Allocate a new global tag
    fn unique_tag(&self) -> Tag;

    /// Register the entity behind a tag so that events can be attributed to
    /// its full hierarchical name.
    fn add_entity(&self, tag: Tag, entity_name: &str);

    /// Determine whether events at `level` are enabled for an entity.
    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool;

    /// Track when an object with the given tag arrives.
    fn enter(&self, enter_into: Tag, enter_obj: Tag);

    /// Track when an object with the given tag leaves.
    fn exit(&self, exit_from: Tag, exit_obj: Tag);

    /// Track a log message of the given level.
    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments);

    /// Advance the current simulated time.
    fn time(&self, set_by: Tag, time: f64);

    /// Flush any buffered output.
    fn shutdown(&self);
}

/// The type of a [`Tracker`] that is shared across entities.
pub type Tracker = Rc<dyn Track>;

/// Create a [`Tracker`] that prints all track events to `stdout`.
pub fn stdout_tracker(level: log::Level) -> Tracker {
    let manager = EntityManager::new(level);
    let stdout_writer = Box::new(io::BufWriter::new(io::stdout()));
    Rc::new(TextTracker::new(manager, stdout_writer))
}

/// Create a [`Tracker`] that suppresses all track events.
pub fn dev_null_tracker() -> Tracker {
    Rc::new(DevNullTracker::new())
}

/// The [`EntityManager`] is responsible for determining entity log / trace
/// enable states.
///
/// The log level of each entity is resolved once, when the entity is
/// registered, against the ordered list of filters. The first filter whose
/// regular expression matches the entity's full name wins.
///
/// This manager is also used to allocate unique [`Tag`] values and to keep
/// the current simulated time for event annotation.
pub struct EntityManager {
    /// Level of _log_ events to output when no filter matches.
    default_level: log::Level,

    /// List of regular expressions mapping entity names to log levels.
    level_filters: Vec<(Regex, log::Level)>,

    /// Resolved level per registered entity.
    entity_levels: RefCell<HashMap<Tag, log::Level>>,

    /// Full name per registered entity.
    entity_names: RefCell<HashMap<Tag, String>>,

    /// Used to assign unique tags.
    next_tag: Cell<u64>,

    /// Keep track of the current simulated time.
    current_time: Cell<f64>,
}

impl EntityManager {
    /// Constructor with the default [`log::Level`]
    #[must_use]
    pub fn new(default_level: log::Level) -> Self {
        Self {
            default_level,
            level_filters: Vec::new(),
            entity_levels: RefCell::new(HashMap::new()),
            entity_names: RefCell::new(HashMap::new()),
            next_tag: Cell::new(ROOT.0 + 1),
            current_time: Cell::new(0.0),
        }
    }

    pub(crate) fn unique_tag(&self) -> Tag {
        let tag = self.next_tag.get();
        self.next_tag.set(tag + 1);
        Tag(tag)
    }

    pub(crate) fn add_entity(&self, tag: Tag, entity_name: &str) {
        let level = self.level_for(entity_name);
        self.entity_levels.borrow_mut().insert(tag, level);
        self.entity_names
            .borrow_mut()
            .insert(tag, entity_name.to_owned());
    }

    pub(crate) fn is_enabled(&self, tag: Tag, level: log::Level) -> bool {
        match self.entity_levels.borrow().get(&tag) {
            Some(enabled) => level <= *enabled,
            None => level <= self.default_level,
        }
    }

    pub(crate) fn name_of(&self, tag: Tag) -> String {
        match self.entity_names.borrow().get(&tag) {
            Some(name) => name.clone(),
            None => format!("#{tag}"),
        }
    }

    fn level_for(&self, entity_name: &str) -> log::Level {
        for (regex, level) in self.level_filters.iter() {
            if regex.is_match(entity_name) {
                return *level;
            }
        }
        self.default_level
    }

    /// Add a log filter regular expression.
    ///
    /// The first pattern added has the highest priority. Filters must be
    /// installed before the entities they are meant to match are created.
    pub fn add_level_filter(
        &mut self,
        regex_str: &str,
        level: log::Level,
    ) -> Result<(), TrackConfigError> {
        match Regex::new(regex_str) {
            Ok(regex) => {
                self.level_filters.push((regex, level));
                Ok(())
            }
            Err(e) => Err(TrackConfigError(format!(
                "failed to parse regex {regex_str}: {e}"
            ))),
        }
    }

    pub(crate) fn time(&self) -> f64 {
        self.current_time.get()
    }

    pub(crate) fn set_time(&self, new_time: f64) {
        assert!(new_time >= self.current_time.get(), "Time moving backwards");
        self.current_time.set(new_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_paths() -> Vec<&'static str> {
        vec!["top", "top::fine", "top::fine.0", "top::fine.1"]
    }

    #[test]
    fn no_filters() {
        let manager = EntityManager::new(log::Level::Error);

        for p in entity_paths() {
            assert_eq!(manager.level_for(p), log::Level::Error);
        }
    }

    #[test]
    fn first_filter_wins() {
        let mut manager = EntityManager::new(log::Level::Error);
        manager.add_level_filter(r".*fine\.0", log::Level::Info).unwrap();
        manager.add_level_filter(r".*fine.*", log::Level::Trace).unwrap();
        manager.add_level_filter(r"top.*", log::Level::Warn).unwrap();

        let expected_levels = [
            log::Level::Warn,
            log::Level::Trace,
            log::Level::Info,
            log::Level::Trace,
        ];

        for (i, p) in entity_paths().iter().enumerate() {
            assert_eq!(manager.level_for(p), expected_levels[i]);
        }
    }

    #[test]
    fn bad_regex_rejected() {
        let mut manager = EntityManager::new(log::Level::Error);
        assert!(manager.add_level_filter(r"*(", log::Level::Info).is_err());
    }

    #[test]
    fn resolved_level_is_sticky() {
        let manager = EntityManager::new(log::Level::Warn);
        let tag = manager.unique_tag();
        manager.add_entity(tag, "top::store");

        assert!(manager.is_enabled(tag, log::Level::Error));
        assert!(manager.is_enabled(tag, log::Level::Warn));
        assert!(!manager.is_enabled(tag, log::Level::Info));
    }

    #[test]
    fn tags() {
        let manager = EntityManager::new(log::Level::Error);
        for i in 0..10 {
            assert_eq!(manager.unique_tag(), Tag(i + ROOT.0 + 1));
        }
    }
}
