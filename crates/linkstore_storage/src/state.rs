//! Storage state shared by snapshots and builders.
//!
//! Every field is a persistent structure. A snapshot holds its state behind
//! an `Arc` and never touches it again; a builder owns a clone and mutates
//! it in place, which copies only the parts it actually edits.

use std::sync::Arc;

use linkstore_foundation::{EntityId, EntitySource, EntityTypeId, Error, PersistentId, Result};

use crate::arena::TypeArena;
use crate::data::EntityRecord;
use crate::index::{OwnershipIndex, SoftLinkIndex};

#[derive(Clone, Debug, Default)]
pub(crate) struct StorageState {
    /// Per-type arenas.
    pub(crate) arenas: im::OrdMap<EntityTypeId, TypeArena>,
    /// Persistent id -> live entity carrying it.
    pub(crate) persistent_ids: im::HashMap<PersistentId, EntityId>,
    /// Reverse soft-link index.
    pub(crate) soft_links: SoftLinkIndex,
    /// Ownership (strong link) index.
    pub(crate) ownership: OwnershipIndex,
    /// Number of live entities across all arenas.
    pub(crate) len: usize,
    /// Commit counter of the snapshot this state belongs to.
    pub(crate) version: u64,
}

impl StorageState {
    /// Returns the live record for `id`.
    pub(crate) fn record(&self, id: EntityId) -> Result<&Arc<EntityRecord>> {
        self.arenas
            .get(&id.type_id)
            .ok_or_else(|| Error::entity_not_found(id))?
            .validate(id)
    }

    /// Returns true if `id` refers to a live entity.
    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.arenas
            .get(&id.type_id)
            .is_some_and(|arena| arena.exists(id))
    }

    /// Resolves a persistent id to the live entity carrying it.
    pub(crate) fn resolve(&self, id: &PersistentId) -> Result<EntityId> {
        self.persistent_ids
            .get(id)
            .copied()
            .ok_or_else(|| Error::unresolved(id.clone()))
    }

    /// Returns the arena for a type, creating it on first use.
    pub(crate) fn arena_mut(&mut self, type_id: EntityTypeId) -> &mut TypeArena {
        self.arenas.entry(type_id).or_insert_with(TypeArena::new)
    }

    /// Iterates over records of one type in insertion order.
    pub(crate) fn records_of_type(
        &self,
        type_id: EntityTypeId,
    ) -> impl Iterator<Item = &Arc<EntityRecord>> + '_ {
        self.arenas
            .get(&type_id)
            .into_iter()
            .flat_map(|arena| arena.iter())
    }

    /// Iterates over all records, grouped by type.
    pub(crate) fn records(&self) -> impl Iterator<Item = &Arc<EntityRecord>> + '_ {
        self.arenas.values().flat_map(|arena| arena.iter())
    }

    /// Iterates over ids of all entities registered with `source`.
    pub(crate) fn ids_by_source<'a>(
        &'a self,
        source: &'a EntitySource,
    ) -> impl Iterator<Item = EntityId> + 'a {
        self.records()
            .filter(move |record| record.source == *source)
            .map(|record| record.id)
    }
}
