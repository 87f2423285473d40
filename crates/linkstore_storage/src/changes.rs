//! Change collection between snapshots.
//!
//! Two snapshots from one builder chain share every subtree the commits in
//! between did not touch. The collector compares per-type slot tries and
//! skips shared subtrees by pointer, so its cost follows the number of
//! changed slots rather than the store size.

use std::collections::BTreeSet;

use linkstore_foundation::{EntityId, EntityTypeId, SlotTrie, TrieChange};

use crate::arena::TypeArena;
use crate::data::EntityRecord;
use crate::snapshot::EntityStorageSnapshot;

/// One entry of a [`ChangeSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityChange {
    /// Entity present only in the later snapshot.
    Added(EntityId),
    /// Entity present only in the earlier snapshot.
    Removed(EntityId),
    /// Entity present in both with different data or source.
    Replaced(EntityId),
}

impl EntityChange {
    /// Returns the affected entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Added(id) | Self::Removed(id) | Self::Replaced(id) => *id,
        }
    }
}

/// Entities that differ between two snapshots, each list sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    added: Vec<EntityId>,
    removed: Vec<EntityId>,
    replaced: Vec<EntityId>,
}

impl ChangeSet {
    /// Entities present only in the later snapshot.
    #[must_use]
    pub fn added(&self) -> &[EntityId] {
        &self.added
    }

    /// Entities present only in the earlier snapshot.
    #[must_use]
    pub fn removed(&self) -> &[EntityId] {
        &self.removed
    }

    /// Entities whose record changed.
    #[must_use]
    pub fn replaced(&self) -> &[EntityId] {
        &self.replaced
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.replaced.is_empty()
    }

    /// Returns the number of affected entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.replaced.len()
    }

    /// Returns true if `id` was added, removed, or replaced.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.added.binary_search(&id).is_ok()
            || self.removed.binary_search(&id).is_ok()
            || self.replaced.binary_search(&id).is_ok()
    }

    /// Returns true if any entity of `type_id` is affected.
    #[must_use]
    pub fn touches_type(&self, type_id: EntityTypeId) -> bool {
        self.changes().any(|change| change.entity().type_id == type_id)
    }

    /// Iterates over removals, then replacements, then additions.
    pub fn changes(&self) -> impl Iterator<Item = EntityChange> + '_ {
        let removed = self.removed.iter().copied().map(EntityChange::Removed);
        let replaced = self.replaced.iter().copied().map(EntityChange::Replaced);
        let added = self.added.iter().copied().map(EntityChange::Added);
        removed.chain(replaced).chain(added)
    }
}

/// Computes the entities that differ from `before` to `after`.
pub(crate) fn collect_changes(
    before: &EntityStorageSnapshot,
    after: &EntityStorageSnapshot,
) -> ChangeSet {
    let mut set = ChangeSet::default();
    if before.ptr_eq(after) {
        return set;
    }

    let earlier = &before.state().arenas;
    let later = &after.state().arenas;
    let types: BTreeSet<EntityTypeId> = earlier.keys().chain(later.keys()).copied().collect();
    let empty = SlotTrie::new();

    for type_id in types {
        let old_slots = earlier.get(&type_id).map_or(&empty, TypeArena::slots);
        let new_slots = later.get(&type_id).map_or(&empty, TypeArena::slots);
        if old_slots.ptr_eq(new_slots) {
            continue;
        }

        for change in old_slots.diff(new_slots, EntityRecord::same_as) {
            match change {
                TrieChange::Added(_, record) => set.added.push(record.id),
                TrieChange::Removed(_, record) => set.removed.push(record.id),
                TrieChange::Changed { old, new, .. } if old.id == new.id => {
                    set.replaced.push(new.id);
                }
                TrieChange::Changed { old, new, .. } => {
                    set.removed.push(old.id);
                    set.added.push(new.id);
                }
            }
        }
    }

    set.added.sort_unstable();
    set.removed.sort_unstable();
    set.replaced.sort_unstable();
    set
}
