//! The entity storage service.
//!
//! `EntityStorage` owns the "current snapshot" pointer of one logical store.
//! Readers load it without locking; a commit publishes a new snapshot with a
//! single compare-and-swap, then notifies listeners with the change set.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use linkstore_foundation::{Error, ErrorContext, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::builder::EntityStorageBuilder;
use crate::changes::{ChangeSet, collect_changes};
use crate::config::StorageConfig;
use crate::snapshot::EntityStorageSnapshot;
use crate::state::StorageState;

// =============================================================================
// Change Notification
// =============================================================================

/// A published commit.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    /// Snapshot that was current before the commit.
    pub before: EntityStorageSnapshot,
    /// Snapshot published by the commit.
    pub after: EntityStorageSnapshot,
    /// Entities that differ between the two.
    pub changes: ChangeSet,
}

/// Receives change events after each commit.
///
/// Listeners run synchronously on the committing thread, after the new
/// snapshot is visible to readers.
pub trait ChangeListener: Send + Sync {
    /// Called once per published commit.
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event);
    }
}

/// Handle returned by [`EntityStorage::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// =============================================================================
// Entity Storage
// =============================================================================

/// Owner of the current snapshot of one logical store.
///
/// The store is passed to the services that need it; there is no global
/// instance.
pub struct EntityStorage {
    current: ArcSwap<StorageState>,
    config: StorageConfig,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ChangeListener>)>>,
    next_listener: AtomicU64,
    /// Superseded snapshots, oldest first.
    history: Mutex<VecDeque<EntityStorageSnapshot>>,
}

impl EntityStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self::from_snapshot(EntityStorageSnapshot::empty(), config)
    }

    /// Creates a store whose current snapshot is `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: EntityStorageSnapshot, config: StorageConfig) -> Self {
        Self {
            current: ArcSwap::new(Arc::clone(snapshot.state_arc())),
            config,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn current(&self) -> EntityStorageSnapshot {
        EntityStorageSnapshot::from_arc(self.current.load_full())
    }

    /// Opens a transaction on the current snapshot.
    #[must_use]
    pub fn builder(&self) -> EntityStorageBuilder {
        self.current().to_builder_with(self.config.clone())
    }

    /// Validates `builder` and publishes its state as the current snapshot.
    ///
    /// On success the builder continues from the published snapshot and the
    /// returned change set has been delivered to every listener.
    ///
    /// # Errors
    ///
    /// - a dangling soft links error if validation fails
    /// - a commit conflict error if another commit was published since the
    ///   builder's base
    ///
    /// In both cases nothing is published and the builder keeps its edits.
    pub fn commit(&self, builder: &mut EntityStorageBuilder) -> Result<ChangeSet> {
        let next = builder.prepare()?;
        let base = builder.base().clone();

        if next.ptr_eq(&base) {
            trace!(version = base.version(), "commit without changes");
            if self.config.notify_empty_changes {
                self.notify(&ChangeEvent {
                    before: base.clone(),
                    after: base,
                    changes: ChangeSet::default(),
                });
            }
            return Ok(ChangeSet::default());
        }

        let prev = self
            .current
            .compare_and_swap(base.state_arc(), Arc::clone(next.state_arc()));
        if !Arc::ptr_eq(&*prev, base.state_arc()) {
            warn!(
                expected = base.version(),
                actual = prev.version,
                "commit conflict"
            );
            return Err(Error::commit_conflict(base.version(), prev.version)
                .with_context(ErrorContext::new().with_operation("publish")));
        }

        builder.rebase(next.clone());
        let changes = collect_changes(&base, &next);
        debug!(
            version = next.version(),
            entities = next.len(),
            changes = changes.len(),
            "published snapshot"
        );

        self.remember(base.clone());
        if !changes.is_empty() || self.config.notify_empty_changes {
            self.notify(&ChangeEvent {
                before: base,
                after: next,
                changes: changes.clone(),
            });
        }
        Ok(changes)
    }

    /// Runs `edit` in a fresh transaction and commits it.
    ///
    /// # Errors
    ///
    /// Returns the first error of `edit`, or the commit error.
    pub fn update<F>(&self, edit: F) -> Result<ChangeSet>
    where
        F: FnOnce(&mut EntityStorageBuilder) -> Result<()>,
    {
        let mut builder = self.builder();
        edit(&mut builder)?;
        self.commit(&mut builder)
    }

    /// Registers a listener for published commits.
    pub fn subscribe(&self, listener: impl ChangeListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    /// Returns the retained superseded snapshots, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<EntityStorageSnapshot> {
        self.history.lock().iter().cloned().collect()
    }

    fn remember(&self, snapshot: EntityStorageSnapshot) {
        if self.config.history_size == 0 {
            return;
        }
        let mut history = self.history.lock();
        history.push_back(snapshot);
        while history.len() > self.config.history_size {
            history.pop_front();
        }
    }

    fn notify(&self, event: &ChangeEvent) {
        // Listeners may subscribe or unsubscribe while being notified
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        trace!(listeners = listeners.len(), "dispatching change event");
        for listener in listeners {
            listener.on_change(event);
        }
    }
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl fmt::Debug for EntityStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStorage")
            .field("current", &self.current())
            .field("listeners", &self.listeners.read().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
