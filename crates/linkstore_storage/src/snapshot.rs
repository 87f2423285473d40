//! Immutable storage snapshots.
//!
//! An `EntityStorageSnapshot` is the unit every consumer reads from. It is
//! never mutated after construction, so any number of threads may read it
//! without synchronization while a builder prepares the next one.

use std::fmt;
use std::sync::Arc;

use linkstore_foundation::{EntityId, EntitySource, EntityTypeId, Error, PersistentId, Result};

use crate::builder::EntityStorageBuilder;
use crate::changes::{ChangeSet, collect_changes};
use crate::config::StorageConfig;
use crate::data::EntityData;
use crate::facade::{AnyEntity, Entity};
use crate::state::StorageState;

/// Immutable view of all entities at one commit point.
///
/// Clone is O(1); clones share the same underlying state.
#[derive(Clone)]
pub struct EntityStorageSnapshot {
    state: Arc<StorageState>,
}

impl EntityStorageSnapshot {
    /// Creates an empty snapshot at version 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_state(StorageState::default())
    }

    pub(crate) fn from_state(state: StorageState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub(crate) fn from_arc(state: Arc<StorageState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &StorageState {
        &self.state
    }

    pub(crate) fn state_arc(&self) -> &Arc<StorageState> {
        &self.state
    }

    /// Returns the commit counter of this snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len
    }

    /// Returns true if the snapshot holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.len == 0
    }

    /// Returns true if both snapshots are the same commit.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    // --- Lookups ---

    /// Returns true if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.contains(id)
    }

    /// Gets an entity by id.
    ///
    /// # Errors
    ///
    /// Returns a stale error if the id's slot has moved to a later generation,
    /// or a not-found error if the slot holds no entity.
    pub fn get(&self, id: EntityId) -> Result<AnyEntity<'_>> {
        self.state.record(id)?;
        Ok(AnyEntity::new(&self.state, id))
    }

    /// Gets an entity by id as type `T`.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch error if `id` belongs to another entity type,
    /// otherwise the same errors as [`get`](Self::get).
    pub fn entity<T: EntityData>(&self, id: EntityId) -> Result<Entity<'_, T>> {
        if id.type_id != T::TYPE {
            return Err(Error::type_mismatch(T::TYPE, id.type_id));
        }
        self.get(id)?.downcast::<T>()
    }

    /// Resolves a persistent id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no live entity carries `id`.
    pub fn resolve(&self, id: &PersistentId) -> Result<AnyEntity<'_>> {
        let entity = self.state.resolve(id)?;
        Ok(AnyEntity::new(&self.state, entity))
    }

    /// Resolves a persistent id as type `T`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no live entity carries `id`, or a type
    /// mismatch error if it targets another entity type.
    pub fn resolve_as<T: EntityData>(&self, id: &PersistentId) -> Result<Entity<'_, T>> {
        self.resolve(id)?.downcast::<T>()
    }

    /// Iterates over all entities of type `T` in insertion order.
    ///
    /// The iterator is finite; call again to restart.
    pub fn entities_of_type<T: EntityData>(&self) -> impl Iterator<Item = Entity<'_, T>> + '_ {
        self.entities_of_type_id(T::TYPE)
            .filter_map(|entity| entity.downcast::<T>().ok())
    }

    /// Iterates over all entities of one type in insertion order.
    pub fn entities_of_type_id(
        &self,
        type_id: EntityTypeId,
    ) -> impl Iterator<Item = AnyEntity<'_>> + '_ {
        self.state
            .records_of_type(type_id)
            .map(|record| AnyEntity::new(&self.state, record.id))
    }

    /// Iterates over every entity, grouped by type.
    pub fn entities(&self) -> impl Iterator<Item = AnyEntity<'_>> + '_ {
        self.state
            .records()
            .map(|record| AnyEntity::new(&self.state, record.id))
    }

    /// Iterates over entities holding a soft link to `target`.
    pub fn referrers(&self, target: &PersistentId) -> impl Iterator<Item = AnyEntity<'_>> + '_ {
        self.state
            .soft_links
            .referrers(target)
            .map(|id| AnyEntity::new(&self.state, id))
    }

    /// Returns the entities owned by `parent`.
    ///
    /// # Errors
    ///
    /// Returns the lookup error for `parent` if it is not live.
    pub fn children(&self, parent: EntityId) -> Result<Vec<AnyEntity<'_>>> {
        self.get(parent)?.children()
    }

    /// Iterates over entities registered with `source`.
    pub fn entities_by_source<'a>(
        &'a self,
        source: &'a EntitySource,
    ) -> impl Iterator<Item = AnyEntity<'a>> + 'a {
        self.state
            .ids_by_source(source)
            .map(|id| AnyEntity::new(&self.state, id))
    }

    // --- Transactions ---

    /// Starts a copy-on-write transaction rooted at this snapshot.
    #[must_use]
    pub fn to_builder(&self) -> EntityStorageBuilder {
        self.to_builder_with(StorageConfig::default())
    }

    /// Starts a transaction with explicit configuration.
    #[must_use]
    pub fn to_builder_with(&self, config: StorageConfig) -> EntityStorageBuilder {
        EntityStorageBuilder::new(self.clone(), config)
    }

    /// Computes the entities added, removed, or replaced since `before`.
    #[must_use]
    pub fn changes_since(&self, before: &EntityStorageSnapshot) -> ChangeSet {
        collect_changes(before, self)
    }
}

impl Default for EntityStorageSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for EntityStorageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStorageSnapshot")
            .field("version", &self.state.version)
            .field("entities", &self.state.len)
            .finish()
    }
}
