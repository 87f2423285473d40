//! Per-type entity arenas with generational slots.
//!
//! A `TypeArena` stores the records of one entity type in a persistent slot
//! trie and tracks a generation per slot to detect stale references to
//! removed entities. Every field is a persistent structure, so cloning an
//! arena is O(1) and edits never disturb snapshots sharing it.

// Slot indices are u32; widening them to usize is lossless on supported targets.
#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;

use linkstore_foundation::{EntityId, EntityTypeId, Error, ErrorKind, Result, SlotTrie};
use tracing::debug;

use crate::data::EntityRecord;

/// Slot storage for one entity type.
#[derive(Clone, Debug, Default)]
pub(crate) struct TypeArena {
    /// Live records by slot.
    slots: SlotTrie<Arc<EntityRecord>>,
    /// Current generation for each slot ever allocated.
    generations: im::Vector<u32>,
    /// Released slots available for reuse (most recent last).
    free_list: im::Vector<u32>,
    /// Insertion sequence -> slot, for reproducible iteration order.
    order: im::OrdMap<u64, u32>,
    /// Next insertion sequence number.
    next_seq: u64,
}

impl TypeArena {
    /// Creates a new empty arena.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserves a slot and returns the id its next record will carry.
    ///
    /// Reuses released slots when available; a reused slot keeps the
    /// generation it was bumped to on release.
    pub(crate) fn allocate(&mut self, type_id: EntityTypeId) -> Result<EntityId> {
        if let Some(index) = self.free_list.pop_back() {
            let generation = self.generations[index as usize];
            return Ok(EntityId::new(type_id, index, generation));
        }

        let index = u32::try_from(self.generations.len()).map_err(|_| {
            Error::new(ErrorKind::Internal(format!(
                "arena for {type_id} exhausted its slot space"
            )))
        })?;
        // Fresh slots start at generation 0
        self.generations.push_back(0);
        Ok(EntityId::new(type_id, index, 0))
    }

    /// Takes the next insertion sequence number.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Installs a record in its slot, replacing any previous record.
    pub(crate) fn install(&mut self, record: Arc<EntityRecord>) {
        let key = record.id.slot_key();
        self.order.insert(record.seq, record.id.index);
        self.slots = self.slots.insert(key, record);
    }

    /// Removes the entity, bumps the slot generation, and frees the slot.
    ///
    /// A slot whose generation cannot be bumped any further is retired
    /// instead: it keeps its last generation and is never reused.
    pub(crate) fn release(&mut self, id: EntityId) -> Result<Arc<EntityRecord>> {
        let record = Arc::clone(self.validate(id)?);

        if let Some(next) = id.generation.checked_add(1) {
            self.generations.set(id.index as usize, next);
            self.free_list.push_back(id.index);
        } else {
            debug!(entity = ?id, "retiring slot with exhausted generations");
        }
        self.order.remove(&record.seq);
        self.slots = self.slots.remove(id.slot_key());

        Ok(record)
    }

    /// Validates that an id refers to a live entity and returns its record.
    ///
    /// Returns a stale error if the slot generation moved past the id's or
    /// the slot was retired, and a not-found error if the slot never existed
    /// or holds no record yet.
    pub(crate) fn validate(&self, id: EntityId) -> Result<&Arc<EntityRecord>> {
        let Some(current_gen) = self.generations.get(id.index as usize) else {
            return Err(Error::entity_not_found(id));
        };

        if *current_gen != id.generation {
            // Generation mismatch - entity was removed and possibly replaced
            return Err(Error::stale_entity(id));
        }

        self.slots.get(id.slot_key()).ok_or_else(|| {
            if id.generation == u32::MAX {
                Error::stale_entity(id)
            } else {
                Error::entity_not_found(id)
            }
        })
    }

    /// Returns true if the id refers to a live entity.
    pub(crate) fn exists(&self, id: EntityId) -> bool {
        self.validate(id).is_ok()
    }

    /// Returns the number of live entities.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over live records in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<EntityRecord>> + '_ {
        self.order
            .values()
            .filter_map(|&slot| self.slots.get(u64::from(slot)))
    }

    /// Returns the current generation for a slot, if it was ever allocated.
    #[cfg(test)]
    pub(crate) fn generation(&self, index: u32) -> Option<u32> {
        self.generations.get(index as usize).copied()
    }

    /// Returns the slot trie for structural comparison.
    pub(crate) fn slots(&self) -> &SlotTrie<Arc<EntityRecord>> {
        &self.slots
    }
}
