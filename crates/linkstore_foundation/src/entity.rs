//! Entity identifiers with per-type arenas and generational slots.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type tag of an entity.
///
/// Each entity type owns a separate arena, so slot indices are only
/// meaningful together with the type tag.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityTypeId(u32);

impl EntityTypeId {
    /// Creates a type tag from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this type tag.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityTypeId({})", self.0)
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Entity identifier with generational index for stale reference detection.
///
/// The generation of a slot starts at 0 and increments every time an entity
/// is removed from it, so an id captured before the removal never matches
/// the slot's next occupant.
///
/// # Layout
/// - `type_id`: arena the entity lives in
/// - `index`: slot within that arena
/// - `generation`: slot generation at allocation time
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId {
    /// Arena (entity type) of the entity.
    pub type_id: EntityTypeId,
    /// Slot within the arena.
    pub index: u32,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(type_id: EntityTypeId, index: u32, generation: u32) -> Self {
        Self {
            type_id,
            index,
            generation,
        }
    }

    /// Returns the slot index widened to a trie key.
    #[must_use]
    pub const fn slot_key(self) -> u64 {
        self.index as u64
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId({}:{}v{})",
            self.type_id, self.index, self.generation
        )
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}:{})", self.type_id, self.index)
    }
}
