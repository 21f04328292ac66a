// Copyright (c) 2026 The resim developers. All rights reserved.

use std::cell::RefCell;

pub use log;

use crate::tracker::{EntityManager, Track};
use crate::{Tag, Writer};

/// A simple text logger to output messages to a [`Writer`].
///
/// Each line is prefixed with the current simulated time and the full
/// hierarchical name of the entity that emitted the event.
pub struct TextTracker {
    entity_manager: EntityManager,

    /// Writer to which all _log_ events will be written.
    writer: RefCell<Writer>,
}

impl TextTracker {
    /// Create a new [`TextTracker`] with an [`EntityManager`].
    pub fn new(entity_manager: EntityManager, writer: Writer) -> Self {
        Self {
            entity_manager,
            writer: RefCell::new(writer),
        }
    }

    fn emit(&self, line: String) {
        self.writer
            .borrow_mut()
            .write_all(line.as_bytes())
            .unwrap();
    }
}

/// Implementation for each [`Track`] event
impl Track for TextTracker {
    fn unique_tag(&self) -> Tag {
        self.entity_manager.unique_tag()
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        self.entity_manager.add_entity(tag, entity_name);
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.entity_manager.is_enabled(tag, level)
    }

    fn enter(&self, tag: Tag, object: Tag) {
        let time = self.entity_manager.time();
        let name = self.entity_manager.name_of(tag);
        self.emit(format!("[{time:.6}] {name}: enter {object}\n"));
    }

    fn exit(&self, tag: Tag, object: Tag) {
        let time = self.entity_manager.time();
        let name = self.entity_manager.name_of(tag);
        self.emit(format!("[{time:.6}] {name}: exit {object}\n"));
    }

    fn log(&self, tag: Tag, level: log::Level, msg: std::fmt::Arguments) {
        let time = self.entity_manager.time();
        let name = self.entity_manager.name_of(tag);
        self.emit(format!("[{time:.6}] {name}:{level}: {msg}\n"));
    }

    fn time(&self, _set_by: Tag, time: f64) {
        self.entity_manager.set_time(time);
    }

    fn shutdown(&self) {
        self.writer.borrow_mut().flush().unwrap();
    }
}
