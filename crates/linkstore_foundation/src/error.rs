//! Error types for the Linkstore system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every error is local to the call that produced it: nothing here poisons
//! a store, and every failure can be retried after repair.

use std::fmt;

use thiserror::Error;

use crate::entity::{EntityId, EntityTypeId};
use crate::persistent_id::PersistentId;
use crate::source::EntitySource;

/// The main error type for Linkstore operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an entity not found error for an internal id.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(EntityLookup::Id(id)))
    }

    /// Creates an entity not found error for a persistent id.
    #[must_use]
    pub fn unresolved(id: PersistentId) -> Self {
        Self::new(ErrorKind::EntityNotFound(EntityLookup::Persistent(id)))
    }

    /// Creates a stale entity reference error.
    #[must_use]
    pub fn stale_entity(id: EntityId) -> Self {
        Self::new(ErrorKind::StaleEntity(id))
    }

    /// Creates a duplicate persistent id error.
    #[must_use]
    pub fn duplicate_persistent_id(id: PersistentId, existing: EntityId) -> Self {
        Self::new(ErrorKind::DuplicatePersistentId { id, existing })
    }

    /// Creates a dangling soft link error.
    #[must_use]
    pub fn dangling_soft_links(links: Vec<DanglingLink>) -> Self {
        Self::new(ErrorKind::DanglingSoftLinks(links))
    }

    /// Creates an entity type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: EntityTypeId, actual: EntityTypeId) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates a commit conflict error.
    #[must_use]
    pub fn commit_conflict(expected: u64, actual: u64) -> Self {
        Self::new(ErrorKind::CommitConflict { expected, actual })
    }

    /// Returns true if this error reports a stale entity id.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self.kind, ErrorKind::StaleEntity(_))
    }

    /// Returns true if this error reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::EntityNotFound(_))
    }

    /// Returns the dangling links if this is a commit validation failure.
    #[must_use]
    pub fn dangling_links(&self) -> Option<&[DanglingLink]> {
        match &self.kind {
            ErrorKind::DanglingSoftLinks(links) => Some(links),
            _ => None,
        }
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// No entity matches the lookup in the queried snapshot.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityLookup),

    /// Entity reference is stale (generation mismatch).
    #[error("stale entity reference: {0:?}")]
    StaleEntity(EntityId),

    /// Another live entity already owns the persistent id.
    #[error("duplicate persistent id {id}: already used by {existing:?}")]
    DuplicatePersistentId {
        /// The contested persistent id.
        id: PersistentId,
        /// The entity currently registered under it.
        existing: EntityId,
    },

    /// Commit found soft links that resolve to nothing.
    #[error("{} dangling soft link(s): {}", .0.len(), DanglingList(.0))]
    DanglingSoftLinks(Vec<DanglingLink>),

    /// An id or data value of one entity type was used as another.
    #[error("entity type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: EntityTypeId,
        /// The type actually found.
        actual: EntityTypeId,
    },

    /// The builder's base snapshot is no longer the published one.
    #[error("commit conflict: builder based on version {expected}, current is {actual}")]
    CommitConflict {
        /// Version the builder was started from.
        expected: u64,
        /// Version currently published.
        actual: u64,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// What a failed lookup was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityLookup {
    /// Lookup by internal id.
    Id(EntityId),
    /// Lookup by persistent id.
    Persistent(PersistentId),
}

impl fmt::Display for EntityLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id:?}"),
            Self::Persistent(id) => write!(f, "{id}"),
        }
    }
}

/// A soft link that does not resolve to a live entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DanglingLink {
    /// The entity holding the link.
    pub referrer: EntityId,
    /// The persistent id it points at.
    pub target: PersistentId,
}

impl fmt::Display for DanglingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {}", self.referrer, self.target)
    }
}

struct DanglingList<'a>(&'a [DanglingLink]);

impl fmt::Display for DanglingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{link}")?;
        }
        Ok(())
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Operation that failed (`add_entity`, `commit`, ...).
    pub operation: Option<String>,
    /// Source of the entity being edited, if any.
    pub source: Option<EntitySource>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failing operation.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the source of the entity being edited.
    #[must_use]
    pub fn with_source(mut self, source: EntitySource) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = &self.operation {
            write!(f, "in {operation}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " (source {source})")?;
        }
        Ok(())
    }
}
