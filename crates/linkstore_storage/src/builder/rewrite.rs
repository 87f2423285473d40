//! Soft-link rewriting.
//!
//! When an entity's persistent id changes, every soft link to the old id
//! must follow it. The reverse index names the referrers directly, so the
//! cost is bounded by the number of referrers rather than the store size.
//!
//! Each referrer is asked to update a copy of its own data. A referrer that
//! declines keeps its old link, which commit validation then reports. A
//! referrer whose own persistent id derives from the link (a library scoped
//! by its module) is renamed by the update, and the rewrite continues with
//! its referrers.

use std::collections::HashSet;
use std::sync::Arc;

use linkstore_foundation::{EntityId, PersistentId, Result};
use tracing::{debug, trace, warn};

use super::EntityStorageBuilder;
use crate::data::{EntityRecord, ErasedData};

impl EntityStorageBuilder {
    /// Rewrites every soft link to `old` into a link to `new`.
    ///
    /// Returns the number of referrers that accepted the rewrite. Use this
    /// to repair links after removing an entity whose role another entity
    /// takes over; renames through
    /// [`modify_entity`](Self::modify_entity) run it automatically.
    ///
    /// # Errors
    ///
    /// Returns a duplicate persistent id error if a referrer renamed by the
    /// rewrite would take an id already in use. The builder is then left as
    /// it was before the call.
    pub fn redirect_soft_links(
        &mut self,
        old: &PersistentId,
        new: &PersistentId,
    ) -> Result<usize> {
        if old == new {
            return Ok(0);
        }
        self.atomically(|builder| builder.rewrite_links(old, new))
    }

    /// Asks every referrer of `target` to drop its link.
    ///
    /// Returns the number of referrers that dropped the link; referrers
    /// whose links are mandatory decline and still fail commit if `target`
    /// stays unresolved.
    ///
    /// # Errors
    ///
    /// Returns a duplicate persistent id error if a referrer renamed by
    /// dropping the link would take an id already in use. The builder is
    /// then left as it was before the call.
    pub fn clear_soft_links_to(&mut self, target: &PersistentId) -> Result<usize> {
        self.atomically(|builder| {
            let mut visited = HashSet::from([target.clone()]);
            let cleared = builder.update_referrers(
                target,
                |data| data.with_link_removed(target),
                &mut visited,
            )?;
            builder.suspects.insert(target.clone());
            debug!(target = %target, cleared, "cleared soft links");
            Ok(cleared)
        })
    }

    pub(super) fn rewrite_links(
        &mut self,
        old: &PersistentId,
        new: &PersistentId,
    ) -> Result<usize> {
        let mut visited = HashSet::new();
        self.rewrite_links_from(old, new, &mut visited)
    }

    /// Rewrites links to `old`, following referrers renamed on the way.
    ///
    /// `visited` holds every id already rewritten or produced in this
    /// cascade; each entity can start at most one nested rewrite, so
    /// entities whose ids derive from each other cannot loop.
    fn rewrite_links_from(
        &mut self,
        old: &PersistentId,
        new: &PersistentId,
        visited: &mut HashSet<PersistentId>,
    ) -> Result<usize> {
        if !visited.insert(old.clone()) {
            trace!(old = %old, "rewrite already visited");
            return Ok(0);
        }
        visited.insert(new.clone());

        let rewritten =
            self.update_referrers(old, |data| data.with_link_updated(old, new), visited)?;
        self.suspects.insert(old.clone());
        self.suspects.insert(new.clone());
        debug!(old = %old, new = %new, rewritten, "rewrote soft links");
        Ok(rewritten)
    }

    /// Applies `update` to every referrer of `target` and installs the
    /// accepted results. Returns the number of accepted updates.
    fn update_referrers<F>(
        &mut self,
        target: &PersistentId,
        update: F,
        visited: &mut HashSet<PersistentId>,
    ) -> Result<usize>
    where
        F: Fn(&dyn ErasedData) -> Option<Arc<dyn ErasedData>>,
    {
        let referrers: Vec<EntityId> = self.state.soft_links.referrers(target).collect();
        let mut accepted = 0;

        for referrer in referrers {
            // Earlier updates in this cascade may have replaced the record
            let Ok(record) = self.state.record(referrer) else {
                continue;
            };
            let record = Arc::clone(record);
            let Some(data) = update(&*record.data) else {
                trace!(referrer = ?referrer, target = %target, "referrer declined update");
                continue;
            };
            if self.replace_links(&record, data, visited)? {
                accepted += 1;
            }
        }

        if accepted > 0 {
            self.dirty = true;
        }
        Ok(accepted)
    }

    /// Installs `data` for `record` and re-indexes its soft links.
    ///
    /// If the update changed the referrer's persistent id, the new id is
    /// claimed and links to the old one are rewritten in turn. Updates that
    /// change the referrer's owner are refused.
    fn replace_links(
        &mut self,
        record: &Arc<EntityRecord>,
        data: Arc<dyn ErasedData>,
        visited: &mut HashSet<PersistentId>,
    ) -> Result<bool> {
        let id = record.id;
        if data.owner() != record.data.owner() {
            warn!(referrer = ?id, "link update changed owner, ignoring");
            return Ok(false);
        }

        let old_pid = record.data.symbolic_id();
        let new_pid = data.symbolic_id();
        let renamed = old_pid != new_pid;
        if renamed {
            if let Some(pid) = &new_pid {
                self.check_claim(id.type_id, pid, Some(id))?;
            }
        }

        let old_links = record.data.link_set();
        let new_links = data.link_set();
        self.state
            .arena_mut(id.type_id)
            .install(Arc::new(record.with_data(data)));
        let added = self.state.soft_links.reindex(id, &old_links, &new_links);
        self.suspects.extend(added);

        if renamed {
            if let Some(old) = &old_pid {
                if self.state.persistent_ids.get(old) == Some(&id) {
                    self.state.persistent_ids.remove(old);
                }
                self.suspects.insert(old.clone());
            }
            if let Some(new) = &new_pid {
                self.state.persistent_ids.insert(new.clone(), id);
            }
            if let (Some(old), Some(new)) = (old_pid, new_pid) {
                debug!(referrer = ?id, old = %old, new = %new, "rewrite renamed referrer");
                self.rewrite_links_from(&old, &new, visited)?;
            }
        }
        Ok(true)
    }
}
