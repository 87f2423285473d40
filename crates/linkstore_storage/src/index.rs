//! Secondary indices over entity records.
//!
//! Soft links are only stored forward (inside entity data); the reverse
//! direction is indexed here so that a rename touches its referrers without
//! scanning the store. Ownership links get the same treatment so removal
//! can cascade to children.

use linkstore_foundation::{EntityId, PersistentId};

/// Reverse soft-link index: target -> set of referrers.
#[derive(Clone, Debug, Default)]
pub(crate) struct SoftLinkIndex {
    referrers: im::HashMap<PersistentId, im::OrdSet<EntityId>>,
}

impl SoftLinkIndex {
    /// Creates a new empty index.
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `referrer` links to every id in `links`.
    pub(crate) fn add<'a>(
        &mut self,
        referrer: EntityId,
        links: impl IntoIterator<Item = &'a PersistentId>,
    ) {
        for link in links {
            self.referrers
                .entry(link.clone())
                .or_insert_with(im::OrdSet::new)
                .insert(referrer);
        }
    }

    /// Forgets that `referrer` links to the ids in `links`.
    ///
    /// Removing a link that was never added is a no-op.
    pub(crate) fn remove<'a>(
        &mut self,
        referrer: EntityId,
        links: impl IntoIterator<Item = &'a PersistentId>,
    ) {
        for link in links {
            let emptied = match self.referrers.get_mut(link) {
                Some(set) => {
                    set.remove(&referrer);
                    set.is_empty()
                }
                None => false,
            };
            if emptied {
                self.referrers.remove(link);
            }
        }
    }

    /// Updates the index after a referrer's link set changed.
    ///
    /// Both slices must be sorted; returns the links that were added.
    pub(crate) fn reindex(
        &mut self,
        referrer: EntityId,
        old: &[PersistentId],
        new: &[PersistentId],
    ) -> Vec<PersistentId> {
        let dropped: Vec<_> = old
            .iter()
            .filter(|l| new.binary_search(l).is_err())
            .collect();
        let added: Vec<_> = new
            .iter()
            .filter(|l| old.binary_search(l).is_err())
            .cloned()
            .collect();
        self.remove(referrer, dropped);
        self.add(referrer, &added);
        added
    }

    /// Iterates over entities linking to `target`, in id order.
    pub(crate) fn referrers(&self, target: &PersistentId) -> impl Iterator<Item = EntityId> + '_ {
        self.referrers
            .get(target)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Returns true if anything links to `target`.
    #[cfg(test)]
    pub(crate) fn is_referenced(&self, target: &PersistentId) -> bool {
        self.referrers.contains_key(target)
    }

    /// Iterates over every linked target.
    pub(crate) fn targets(&self) -> impl Iterator<Item = &PersistentId> + '_ {
        self.referrers.keys()
    }
}

/// Ownership index: parent -> set of owned children.
#[derive(Clone, Debug, Default)]
pub(crate) struct OwnershipIndex {
    children: im::HashMap<EntityId, im::OrdSet<EntityId>>,
}

impl OwnershipIndex {
    /// Creates a new empty index.
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `parent` owns `child`.
    pub(crate) fn link(&mut self, parent: EntityId, child: EntityId) {
        self.children
            .entry(parent)
            .or_insert_with(im::OrdSet::new)
            .insert(child);
    }

    /// Removes the ownership edge, if present.
    pub(crate) fn unlink(&mut self, parent: EntityId, child: EntityId) {
        let emptied = match self.children.get_mut(&parent) {
            Some(set) => {
                set.remove(&child);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            self.children.remove(&parent);
        }
    }

    /// Iterates over the children of `parent`, in id order.
    pub(crate) fn children(&self, parent: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.children
            .get(&parent)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}
