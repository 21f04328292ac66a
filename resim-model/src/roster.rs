// Copyright (c) 2026 The resim developers. All rights reserved.

//! Bookkeeping of which worker instances are still running.
//!
//! The shutdown protocol needs to know how many siblings of a role are
//! still alive (the last one forwards the marker downstream), and the
//! pipeline needs the names of any workers left running once the event
//! queue drains - that is a deadlock.

use std::cell::RefCell;

struct Entry {
    role: String,
    name: String,
}

/// The set of currently running worker instances.
#[derive(Default)]
pub struct Roster {
    running: RefCell<Vec<Entry>>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker instance at construction time.
    pub fn enlist(&self, role: &str, name: &str) {
        self.running.borrow_mut().push(Entry {
            role: role.to_owned(),
            name: name.to_owned(),
        });
    }

    /// Remove a worker instance once its run loop terminates.
    pub fn retire(&self, name: &str) {
        let mut running = self.running.borrow_mut();
        if let Some(index) = running.iter().position(|e| e.name == name) {
            running.remove(index);
        }
    }

    /// Number of running instances of a role, the caller included.
    #[must_use]
    pub fn count_role(&self, role: &str) -> usize {
        self.running.borrow().iter().filter(|e| e.role == role).count()
    }

    /// Names of all workers still running.
    #[must_use]
    pub fn stalled(&self) -> Vec<String> {
        self.running.borrow().iter().map(|e| e.name.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_and_retire() {
        let roster = Roster::new();
        roster.enlist("fine", "fine.0");
        roster.enlist("fine", "fine.1");
        roster.enlist("mesher", "mesher");

        assert_eq!(roster.count_role("fine"), 2);
        assert_eq!(roster.count_role("mesher"), 1);
        assert_eq!(roster.count_role("device"), 0);

        roster.retire("fine.1");
        assert_eq!(roster.count_role("fine"), 1);
        assert_eq!(roster.stalled(), vec!["fine.0", "mesher"]);
        assert!(!roster.is_empty());

        roster.retire("fine.0");
        roster.retire("mesher");
        assert!(roster.is_empty());
    }
}
