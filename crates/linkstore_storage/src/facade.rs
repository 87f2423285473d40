//! Read-only entity facades.
//!
//! A facade is an `EntityId` paired with the storage state it was obtained
//! from. Every accessor re-validates the id's generation, so a facade can
//! never hand out data belonging to a different occupant of the same slot.
//! Facades borrow their snapshot; they are cheap, `Copy`, and disposable.

use std::fmt;
use std::marker::PhantomData;

use linkstore_foundation::{EntityId, EntitySource, EntityTypeId, Error, PersistentId, Result};

use crate::data::{EntityData, EntityRecord, ErasedData};
use crate::snapshot::EntityStorageSnapshot;
use crate::state::StorageState;

/// Untyped view of one entity.
#[derive(Clone, Copy)]
pub struct AnyEntity<'a> {
    state: &'a StorageState,
    id: EntityId,
}

impl<'a> AnyEntity<'a> {
    pub(crate) fn new(state: &'a StorageState, id: EntityId) -> Self {
        Self { state, id }
    }

    fn record(&self) -> Result<&'a EntityRecord> {
        self.state.record(self.id).map(|record| &**record)
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity type.
    #[must_use]
    pub fn type_id(&self) -> EntityTypeId {
        self.id.type_id
    }

    /// Returns true if the id still refers to a live entity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.contains(self.id)
    }

    /// Returns the persistent id, if the entity type has one.
    pub fn persistent_id(&self) -> Result<Option<PersistentId>> {
        Ok(self.record()?.data.symbolic_id())
    }

    /// Returns the source the entity was added with.
    pub fn source(&self) -> Result<&'a EntitySource> {
        Ok(&self.record()?.source)
    }

    /// Returns the soft links held by the entity, sorted and deduplicated.
    pub fn soft_links(&self) -> Result<Vec<PersistentId>> {
        Ok(self.record()?.data.link_set())
    }

    /// Returns the owning entity, if any.
    pub fn parent(&self) -> Result<Option<AnyEntity<'a>>> {
        let parent = self.record()?.data.owner();
        Ok(parent.map(|id| AnyEntity::new(self.state, id)))
    }

    /// Returns the entities owned by this one.
    pub fn children(&self) -> Result<Vec<AnyEntity<'a>>> {
        self.record()?;
        Ok(self
            .state
            .ownership
            .children(self.id)
            .map(|id| AnyEntity::new(self.state, id))
            .collect())
    }

    /// Returns the entities holding soft links to this entity.
    pub fn referrers(&self) -> Result<Vec<AnyEntity<'a>>> {
        let Some(persistent_id) = self.persistent_id()? else {
            return Ok(Vec::new());
        };
        Ok(self
            .state
            .soft_links
            .referrers(&persistent_id)
            .map(|id| AnyEntity::new(self.state, id))
            .collect())
    }

    /// Views the entity as type `T`.
    pub fn downcast<T: EntityData>(&self) -> Result<Entity<'a, T>> {
        if self.id.type_id != T::TYPE {
            return Err(Error::type_mismatch(T::TYPE, self.id.type_id));
        }
        Ok(Entity {
            inner: *self,
            _marker: PhantomData,
        })
    }

    /// Returns the data as type `T`.
    pub fn data_as<T: EntityData>(&self) -> Result<&'a T> {
        self.downcast::<T>()?.data()
    }

    /// Re-validates this facade against another snapshot.
    ///
    /// Fails with a stale error if the slot was reused in `snapshot`.
    pub fn rebind<'b>(&self, snapshot: &'b EntityStorageSnapshot) -> Result<AnyEntity<'b>> {
        snapshot.get(self.id)
    }
}

impl fmt::Debug for AnyEntity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record() {
            Ok(record) => f
                .debug_struct("AnyEntity")
                .field("id", &self.id)
                .field("data", &record.data)
                .finish(),
            Err(_) => write!(f, "AnyEntity({:?}, invalid)", self.id),
        }
    }
}

/// Typed view of one entity.
pub struct Entity<'a, T> {
    inner: AnyEntity<'a>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Entity<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Entity<'_, T> {}

impl<'a, T: EntityData> Entity<'a, T> {
    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Returns the entity data.
    pub fn data(&self) -> Result<&'a T> {
        let record = self.inner.record()?;
        record.downcast::<T>().ok_or_else(|| {
            Error::type_mismatch(T::TYPE, record.data.type_tag())
        })
    }

    /// Returns true if the id still refers to a live entity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    /// Returns the persistent id, if the entity type has one.
    pub fn persistent_id(&self) -> Result<Option<PersistentId>> {
        self.inner.persistent_id()
    }

    /// Returns the source the entity was added with.
    pub fn source(&self) -> Result<&'a EntitySource> {
        self.inner.source()
    }

    /// Returns the soft links held by the entity.
    pub fn soft_links(&self) -> Result<Vec<PersistentId>> {
        self.inner.soft_links()
    }

    /// Returns the owning entity, if any.
    pub fn parent(&self) -> Result<Option<AnyEntity<'a>>> {
        self.inner.parent()
    }

    /// Returns the entities owned by this one.
    pub fn children(&self) -> Result<Vec<AnyEntity<'a>>> {
        self.inner.children()
    }

    /// Returns the entities holding soft links to this entity.
    pub fn referrers(&self) -> Result<Vec<AnyEntity<'a>>> {
        self.inner.referrers()
    }

    /// Drops the type information.
    #[must_use]
    pub fn untyped(&self) -> AnyEntity<'a> {
        self.inner
    }

    /// Re-validates this facade against another snapshot.
    pub fn rebind<'b>(&self, snapshot: &'b EntityStorageSnapshot) -> Result<Entity<'b, T>> {
        snapshot.entity::<T>(self.id())
    }
}

impl<T> fmt::Debug for Entity<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
