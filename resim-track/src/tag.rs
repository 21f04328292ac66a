// Copyright (c) 2026 The resim developers. All rights reserved.

//! Tag

/// Tags that should be unique across the simulation
///
/// Each _log_/_trace_ event within the application is given a unique tag to
/// identify it. There are two reserved tag values:
/// [NO_ID](crate::NO_ID) and [ROOT](crate::ROOT).
#[derive(Copy, Clone, Default, Eq, Hash, PartialEq)]
pub struct Tag(pub u64);

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
