//! Copy-on-write transactions over a snapshot.
//!
//! A builder clones the state of its base snapshot (O(1), every part is a
//! persistent structure) and edits the clone in place. Edits copy only the
//! paths they touch, so the base snapshot and every other snapshot sharing
//! structure with it are never disturbed.
//!
//! Soft links may dangle while a transaction is open. `commit` validates
//! them; see [`EntityStorageBuilder::commit`].

mod rewrite;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use linkstore_foundation::{
    DanglingLink, EntityId, EntitySource, EntityTypeId, Error, ErrorContext, PersistentId,
    Result,
};
use tracing::{debug, trace, warn};

use crate::config::StorageConfig;
use crate::data::{EntityData, EntityRecord, ErasedData};
use crate::facade::{AnyEntity, Entity};
use crate::snapshot::EntityStorageSnapshot;
use crate::state::StorageState;

/// Single-writer transaction producing a new snapshot on commit.
///
/// Builders are not shared between threads mid-transaction; the service
/// owning the store decides who may open one.
pub struct EntityStorageBuilder {
    base: EntityStorageSnapshot,
    state: StorageState,
    /// Persistent ids whose referrers may have been left dangling.
    suspects: HashSet<PersistentId>,
    config: StorageConfig,
    dirty: bool,
}

impl EntityStorageBuilder {
    pub(crate) fn new(base: EntityStorageSnapshot, config: StorageConfig) -> Self {
        let state = base.state().clone();
        Self {
            base,
            state,
            suspects: HashSet::new(),
            config,
            dirty: false,
        }
    }

    /// Returns the snapshot this transaction is rooted at.
    #[must_use]
    pub fn base(&self) -> &EntityStorageSnapshot {
        &self.base
    }

    /// Returns the builder configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns true if any edit was applied since the last commit.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    // --- Edits ---

    /// Adds an entity and returns its id.
    ///
    /// The entity gets a fresh slot at generation 0, or a released slot at
    /// the generation it was bumped to on removal.
    ///
    /// # Errors
    ///
    /// - a duplicate persistent id error if another live entity already
    ///   carries the entity's persistent id
    /// - a type mismatch error if the persistent id targets another type
    /// - the lookup error for the parent if it is not live
    ///
    /// Errors carry `source` in their context.
    pub fn add_entity<T: EntityData>(&mut self, data: T, source: EntitySource) -> Result<EntityId> {
        let persistent_id = EntityData::persistent_id(&data);
        let parent = EntityData::parent(&data);
        if let Err(err) = self.check_admission(T::TYPE, persistent_id.as_ref(), parent) {
            return Err(err.with_context(
                ErrorContext::new()
                    .with_operation("add_entity")
                    .with_source(source),
            ));
        }
        let links = data.link_set();

        let arena = self.state.arena_mut(T::TYPE);
        let id = arena.allocate(T::TYPE)?;
        let seq = arena.next_seq();
        arena.install(Arc::new(EntityRecord {
            id,
            data: Arc::new(data),
            source,
            seq,
        }));
        self.state.len += 1;

        if let Some(pid) = persistent_id {
            self.state.persistent_ids.insert(pid, id);
        }
        if let Some(parent) = parent {
            self.state.ownership.link(parent, id);
        }
        self.state.soft_links.add(id, &links);
        self.suspects.extend(links);
        self.dirty = true;

        trace!(entity = ?id, "added entity");
        Ok(id)
    }

    /// Applies `mutator` to a copy of the entity's data and installs the result.
    ///
    /// A mutation leaving the data unchanged is a no-op. A mutation changing
    /// the persistent id registers the new id and rewrites every soft link
    /// to the old one through the reverse index.
    ///
    /// # Errors
    ///
    /// - the lookup error for `id`, or a type mismatch error if it is not a `T`
    /// - a duplicate persistent id error if the new id is already taken, by
    ///   this entity or by a referrer renamed through the rewrite
    /// - the lookup error for a new parent that is not live
    ///
    /// On error the builder is left untouched.
    pub fn modify_entity<T, F>(&mut self, id: EntityId, mutator: F) -> Result<()>
    where
        T: EntityData,
        F: FnOnce(&mut T),
    {
        if id.type_id != T::TYPE {
            return Err(Error::type_mismatch(T::TYPE, id.type_id));
        }
        let record = Arc::clone(self.state.record(id)?);
        let current = record
            .downcast::<T>()
            .ok_or_else(|| Error::type_mismatch(T::TYPE, record.data.type_tag()))?;

        let mut data = current.clone();
        mutator(&mut data);
        if data == *current {
            return Ok(());
        }

        let old_pid = EntityData::persistent_id(current);
        let new_pid = EntityData::persistent_id(&data);
        if old_pid != new_pid {
            if let Some(pid) = &new_pid {
                self.check_claim(T::TYPE, pid, Some(id))?;
            }
        }
        let old_parent = EntityData::parent(current);
        let new_parent = EntityData::parent(&data);
        if old_parent != new_parent {
            if let Some(parent) = new_parent {
                self.state.record(parent)?;
            }
        }

        let old_links = current.link_set();
        let new_links = data.link_set();
        self.atomically(|builder| {
            builder
                .state
                .arena_mut(T::TYPE)
                .install(Arc::new(record.with_data(Arc::new(data))));

            let added = builder.state.soft_links.reindex(id, &old_links, &new_links);
            builder.suspects.extend(added);

            if old_parent != new_parent {
                if let Some(parent) = old_parent {
                    builder.state.ownership.unlink(parent, id);
                }
                if let Some(parent) = new_parent {
                    builder.state.ownership.link(parent, id);
                }
            }
            builder.dirty = true;

            if old_pid != new_pid {
                if let Some(old) = &old_pid {
                    builder.state.persistent_ids.remove(old);
                    builder.suspects.insert(old.clone());
                }
                if let Some(new) = &new_pid {
                    builder.state.persistent_ids.insert(new.clone(), id);
                }
                // Runs after the new data is installed so self-links are rewritten too
                if let (Some(old), Some(new)) = (&old_pid, &new_pid) {
                    debug!(entity = ?id, old = %old, new = %new, "persistent id changed");
                    builder.rewrite_links(old, new)?;
                }
            }
            Ok(())
        })?;

        trace!(entity = ?id, "modified entity");
        Ok(())
    }

    /// Removes an entity and, depth-first, every entity it owns.
    ///
    /// Each removed slot has its generation bumped. Soft links to removed
    /// entities are left in place and must be repaired before commit.
    /// Returns the removed ids, the requested entity first.
    ///
    /// # Errors
    ///
    /// Returns the lookup error for `id` if it is not live.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Vec<EntityId>> {
        self.state.record(id)?;

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if !self.state.contains(next) {
                continue;
            }
            pending.extend(self.state.ownership.children(next));
            self.release(next)?;
            removed.push(next);
        }
        self.dirty = true;

        debug!(entity = ?id, removed = removed.len(), "removed entity");
        Ok(removed)
    }

    fn release(&mut self, id: EntityId) -> Result<()> {
        let record = self.state.arena_mut(id.type_id).release(id)?;
        self.state.len -= 1;

        if let Some(pid) = record.data.symbolic_id() {
            if self.state.persistent_ids.get(&pid) == Some(&id) {
                self.state.persistent_ids.remove(&pid);
            }
            self.suspects.insert(pid);
        }
        self.state.soft_links.remove(id, &record.data.link_set());
        if let Some(parent) = record.data.owner() {
            self.state.ownership.unlink(parent, id);
        }
        Ok(())
    }

    /// Runs `edit`, restoring the entity state if it fails.
    ///
    /// Suspects are kept; extra suspects only widen commit validation.
    fn atomically<R>(&mut self, edit: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let state = self.state.clone();
        let dirty = self.dirty;
        let result = edit(self);
        if result.is_err() {
            self.state = state;
            self.dirty = dirty;
        }
        result
    }

    /// Checks that a new entity may claim `pid` and attach to `parent`.
    fn check_admission(
        &self,
        type_id: EntityTypeId,
        pid: Option<&PersistentId>,
        parent: Option<EntityId>,
    ) -> Result<()> {
        if let Some(pid) = pid {
            self.check_claim(type_id, pid, None)?;
        }
        if let Some(parent) = parent {
            self.state.record(parent)?;
        }
        Ok(())
    }

    /// Checks that `pid` may be claimed by an entity of type `type_id`.
    fn check_claim(
        &self,
        type_id: EntityTypeId,
        pid: &PersistentId,
        claimant: Option<EntityId>,
    ) -> Result<()> {
        if pid.target() != type_id {
            return Err(Error::type_mismatch(type_id, pid.target()));
        }
        match self.state.persistent_ids.get(pid) {
            Some(&existing) if Some(existing) != claimant => {
                Err(Error::duplicate_persistent_id(pid.clone(), existing))
            }
            _ => Ok(()),
        }
    }

    // --- Commit ---

    /// Validates the transaction and publishes it as a new snapshot.
    ///
    /// Every soft link the transaction could have broken must resolve to a
    /// live entity (every indexed link under
    /// [`StorageConfig::full_link_validation`]). On success the builder
    /// continues from the new snapshot. A builder without changes returns
    /// its base.
    ///
    /// # Errors
    ///
    /// Returns a dangling soft links error listing every offending
    /// (referrer, target) pair. The builder keeps its edits so the caller can
    /// repair them and commit again.
    pub fn commit(&mut self) -> Result<EntityStorageSnapshot> {
        let snapshot = self.prepare()?;
        self.rebase(snapshot.clone());
        Ok(snapshot)
    }

    /// Validates and materializes the next snapshot without consuming edits.
    pub(crate) fn prepare(&self) -> Result<EntityStorageSnapshot> {
        if !self.dirty {
            return Ok(self.base.clone());
        }

        let dangling = self.dangling_links();
        if !dangling.is_empty() {
            warn!(
                count = dangling.len(),
                base = self.base.version(),
                "commit rejected: dangling soft links"
            );
            return Err(Error::dangling_soft_links(dangling)
                .with_context(ErrorContext::new().with_operation("commit")));
        }

        let mut state = self.state.clone();
        state.version = self.base.version() + 1;
        debug!(
            version = state.version,
            entities = state.len,
            checked = self.suspects.len(),
            "prepared snapshot"
        );
        Ok(EntityStorageSnapshot::from_state(state))
    }

    /// Continues the transaction chain from `snapshot`.
    pub(crate) fn rebase(&mut self, snapshot: EntityStorageSnapshot) {
        self.state = snapshot.state().clone();
        self.base = snapshot;
        self.suspects.clear();
        self.dirty = false;
    }

    fn dangling_links(&self) -> Vec<DanglingLink> {
        let mut dangling = Vec::new();
        let mut check = |target: &PersistentId| {
            if self.state.persistent_ids.contains_key(target) {
                return;
            }
            dangling.extend(self.state.soft_links.referrers(target).map(|referrer| {
                DanglingLink {
                    referrer,
                    target: target.clone(),
                }
            }));
        };

        if self.config.full_link_validation {
            self.state.soft_links.targets().for_each(&mut check);
        } else {
            self.suspects.iter().for_each(&mut check);
        }
        dangling.sort();
        dangling
    }

    // --- Reads (see uncommitted edits) ---

    /// Returns the version of the base snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.base.version()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len
    }

    /// Returns true if no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.len == 0
    }

    /// Returns true if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.contains(id)
    }

    /// Gets an entity by id.
    ///
    /// # Errors
    ///
    /// Returns a stale or not-found error if `id` is not live.
    pub fn get(&self, id: EntityId) -> Result<AnyEntity<'_>> {
        self.state.record(id)?;
        Ok(AnyEntity::new(&self.state, id))
    }

    /// Gets an entity by id as type `T`.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch error if `id` is not a `T`, or the lookup
    /// error for `id`.
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
    /// Returns a not-found or type mismatch error.
    pub fn resolve_as<T: EntityData>(&self, id: &PersistentId) -> Result<Entity<'_, T>> {
        self.resolve(id)?.downcast::<T>()
    }

    /// Iterates over all entities of type `T` in insertion order.
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
}

impl fmt::Debug for EntityStorageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStorageBuilder")
            .field("base", &self.base.version())
            .field("entities", &self.state.len)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
