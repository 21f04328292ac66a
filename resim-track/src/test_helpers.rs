// Copyright (c) 2026 The resim developers. All rights reserved.

//! This module provides helper functions for testing logging output
//!
//! The aim of this module is to provide commonly-used functions that enable
//! the testing of the output that should appear from logging macros, and a
//! standard way for tests across the workspace to create a [`Tracker`].

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use regex::Regex;

use crate::tracker::EntityManager;
use crate::{Tag, Track, Tracker, Writer};

/// A tracker that keeps track events in memory.
pub struct TestTracker {
    events: RefCell<Vec<String>>,

    next_tag: Cell<u64>,
}

impl TestTracker {
    /// Create a new [`Tracker`] for the tests.
    ///
    /// This keeps the track events in memory for checking later.
    #[must_use]
    pub fn new(initial_tag: u64) -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            next_tag: Cell::new(initial_tag),
        }
    }

    fn add_event(&self, event: String) {
        println!("{event}");
        self.events.borrow_mut().push(event);
    }

    /// A copy of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl Track for TestTracker {
    fn unique_tag(&self) -> Tag {
        let tag = self.next_tag.get();
        self.next_tag.set(tag + 1);
        Tag(tag)
    }

    fn add_entity(&self, _tag: Tag, _entity_name: &str) {
        // Do nothing
    }

    fn is_entity_enabled(&self, _tag: Tag, _level: log::Level) -> bool {
        true
    }

    fn enter(&self, tag: Tag, item: Tag) {
        self.add_event(format!("{tag}: {item} entered"));
    }

    fn exit(&self, tag: Tag, item: Tag) {
        self.add_event(format!("{tag}: {item} exited"));
    }

    fn log(&self, tag: Tag, level: log::Level, msg: std::fmt::Arguments) {
        self.add_event(format!("{tag}:{level}: {msg}"));
    }

    fn time(&self, set_by: Tag, time: f64) {
        self.add_event(format!("{set_by}: set time {time:.6}"));
    }

    fn shutdown(&self) {
        // Do nothing
    }
}

/// Initialise the logging system for tests
///
/// Creates a [`TestTracker`] that records all track events in memory, and
/// returns both the concrete tracker (for checking) and the type-erased
/// [`Tracker`] (for building entities).
///
/// # Arguments
///
/// * `start_tag` - The tag value to be set as the starting value
#[macro_export]
macro_rules! test_init {
    ($start_tag:expr) => {{
        let test_tracker = std::rc::Rc::new($crate::test_helpers::TestTracker::new($start_tag));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

/// Check and clear the _trace_ and _log_ output
///
/// This function asserts that the logging output lines seen since the start
/// or the last time this function was called match the expected regular
/// expressions, then clears the recorded output.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut log_contents_ref = tracker.events.borrow_mut();

    println!("Checking {:?} matches {:?}", expected, *log_contents_ref);

    // Check that there are the same number of strings produced as expected
    let num_strings = expected.len();
    assert_eq!(num_strings, log_contents_ref.len());

    for i in 0..num_strings {
        let log_expect = expected[i];
        let re = Regex::new(log_expect).unwrap();
        let actual = &(*log_contents_ref[i]);
        println!("Checking {i}: {log_expect:?} matches {actual:?}");
        assert!(re.is_match(actual));
    }

    log_contents_ref.clear();
}

/// Create a [`Tracker`] for a test that writes a text log under `traces/`.
///
/// The log file is named after the test source file so that concurrent test
/// binaries do not fight over one file.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    // Place all trace files in one folder
    const FOLDER: &str = "traces";

    // Create that folder if it doesn't exist yet
    fs::create_dir_all(FOLDER).unwrap();

    let filename_only = Path::new(full_filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap();

    let writer: Writer = Box::new(std::io::BufWriter::new(
        fs::File::create(format!("{FOLDER}/{filename_only}.log")).unwrap(),
    ));

    let manager = EntityManager::new(log::Level::Trace);
    let tracker: Tracker = Rc::new(crate::tracker::TextTracker::new(manager, writer));
    tracker
}
