//! Dirty-state coordinator
//!
//! Holds the single "is anything different from baseline?" flag. Recomputation
//! is event-driven: it runs synchronously after each registry mutation, never
//! on a poll.

use crate::registry::FieldRegistry;

/// Save/discard button enablement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub save_enabled: bool,
    pub discard_enabled: bool,
}

/// Result of a recheck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recheck {
    pub is_dirty: bool,
    /// The flag changed value during this recheck
    pub flipped: bool,
}

#[derive(Debug, Default)]
pub struct DirtyState {
    is_dirty: bool,
}

impl DirtyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Recompute the flag from the registry
    pub fn recheck(&mut self, registry: &FieldRegistry) -> Recheck {
        let has_changes = registry.has_changes();
        let flipped = has_changes != self.is_dirty;
        self.is_dirty = has_changes;
        Recheck {
            is_dirty: has_changes,
            flipped,
        }
    }

    /// Force the flag clean (after save or discard); returns whether it flipped
    pub fn clear(&mut self) -> bool {
        std::mem::replace(&mut self.is_dirty, false)
    }

    /// Buttons are live only while dirty; discard is also blocked mid-save
    pub fn affordances(&self, is_saving: bool) -> Affordances {
        Affordances {
            save_enabled: self.is_dirty && !is_saving,
            discard_enabled: self.is_dirty && !is_saving,
        }
    }
}
