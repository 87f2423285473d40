//! Entity data records and the soft-link capability.
//!
//! Entity types are plain Rust values implementing [`EntityData`]. The store
//! keeps them type-erased so that the builder can rewrite soft links held by
//! entities of any type without knowing their concrete type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use linkstore_foundation::{EntityId, EntitySource, EntityTypeId, PersistentId};

/// Capability of entities that reference other entities by [`PersistentId`].
///
/// Soft links are weak: they express a relation resolved by lookup, never
/// ownership, and they may dangle while a transaction is in progress.
pub trait SoftLinkable {
    /// Enumerates every persistent id this entity links to.
    fn links(&self) -> Vec<PersistentId>;

    /// Replaces links to `old` with `new`.
    ///
    /// Returns false when the entity declines the rewrite, for example
    /// because it holds no link to `old`.
    fn update_link(&mut self, old: &PersistentId, new: &PersistentId) -> bool;

    /// Drops links to `link`.
    ///
    /// Entities whose links are mandatory keep the default, which declines.
    fn remove_link(&mut self, link: &PersistentId) -> bool {
        let _ = link;
        false
    }
}

/// Data of one entity type.
///
/// Implementors pick a unique [`EntityTypeId`] and describe how the entity
/// is addressed (`persistent_id`), who owns it (`parent`), and whether it
/// holds soft links (`soft_linkable`).
pub trait EntityData: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Arena this entity type lives in.
    const TYPE: EntityTypeId;

    /// Symbolic identity derived from identity-defining attributes.
    ///
    /// The returned id must target [`Self::TYPE`].
    fn persistent_id(&self) -> Option<PersistentId> {
        None
    }

    /// Owning entity; removing the parent removes this entity too.
    fn parent(&self) -> Option<EntityId> {
        None
    }

    /// Soft-link capability, if this type holds soft links.
    fn soft_linkable(&self) -> Option<&dyn SoftLinkable> {
        None
    }

    /// Mutable soft-link capability used by the rewrite protocol.
    fn soft_linkable_mut(&mut self) -> Option<&mut dyn SoftLinkable> {
        None
    }
}

/// Object-safe view of [`EntityData`] used inside the store.
pub(crate) trait ErasedData: fmt::Debug + Send + Sync {
    fn type_tag(&self) -> EntityTypeId;
    fn symbolic_id(&self) -> Option<PersistentId>;
    fn owner(&self) -> Option<EntityId>;
    /// Sorted, deduplicated soft links.
    fn link_set(&self) -> Vec<PersistentId>;
    fn with_link_updated(&self, old: &PersistentId, new: &PersistentId)
    -> Option<Arc<dyn ErasedData>>;
    fn with_link_removed(&self, link: &PersistentId) -> Option<Arc<dyn ErasedData>>;
    fn data_eq(&self, other: &dyn ErasedData) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: EntityData> ErasedData for T {
    fn type_tag(&self) -> EntityTypeId {
        T::TYPE
    }

    fn symbolic_id(&self) -> Option<PersistentId> {
        EntityData::persistent_id(self)
    }

    fn owner(&self) -> Option<EntityId> {
        EntityData::parent(self)
    }

    fn link_set(&self) -> Vec<PersistentId> {
        let mut links = self
            .soft_linkable()
            .map(SoftLinkable::links)
            .unwrap_or_default();
        links.sort_unstable();
        links.dedup();
        links
    }

    fn with_link_updated(
        &self,
        old: &PersistentId,
        new: &PersistentId,
    ) -> Option<Arc<dyn ErasedData>> {
        let mut copy = self.clone();
        let accepted = copy.soft_linkable_mut()?.update_link(old, new);
        accepted.then(|| Arc::new(copy) as Arc<dyn ErasedData>)
    }

    fn with_link_removed(&self, link: &PersistentId) -> Option<Arc<dyn ErasedData>> {
        let mut copy = self.clone();
        let accepted = copy.soft_linkable_mut()?.remove_link(link);
        accepted.then(|| Arc::new(copy) as Arc<dyn ErasedData>)
    }

    fn data_eq(&self, other: &dyn ErasedData) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One stored entity: its data plus store bookkeeping.
///
/// Records are immutable and shared by `Arc`; any edit installs a new record,
/// so pointer equality means "unchanged".
#[derive(Debug)]
pub(crate) struct EntityRecord {
    pub(crate) id: EntityId,
    pub(crate) data: Arc<dyn ErasedData>,
    pub(crate) source: EntitySource,
    /// Insertion sequence within the arena, used for iteration order.
    pub(crate) seq: u64,
}

impl EntityRecord {
    /// Returns a record for the same entity carrying new data.
    pub(crate) fn with_data(&self, data: Arc<dyn ErasedData>) -> Self {
        Self {
            id: self.id,
            data,
            source: self.source.clone(),
            seq: self.seq,
        }
    }

    /// Returns true if both records describe the same entity state.
    pub(crate) fn same_as(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
            || (a.id == b.id
                && a.source == b.source
                && (Arc::ptr_eq(&a.data, &b.data) || a.data.data_eq(&*b.data)))
    }

    pub(crate) fn downcast<T: EntityData>(&self) -> Option<&T> {
        self.data.as_any().downcast_ref::<T>()
    }
}
