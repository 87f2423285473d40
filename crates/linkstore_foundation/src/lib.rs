//! Identifiers, errors, and persistent slot storage for Linkstore.
//!
//! This crate provides:
//! - [`EntityId`] - Generational, per-type entity identifiers
//! - [`PersistentId`] - Stable symbolic identifiers used by soft links
//! - [`EntitySource`] - Origin tags attached to every entity
//! - [`Error`] - Rich error types with context
//! - [`SlotTrie`] - Persistent Patricia trie with structural sharing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod entity;
mod error;
mod persistent_id;
mod source;
pub mod trie;

pub use entity::{EntityId, EntityTypeId};
pub use error::{DanglingLink, EntityLookup, Error, ErrorContext, ErrorKind};
pub use persistent_id::PersistentId;
pub use source::EntitySource;
pub use trie::{SlotTrie, TrieChange};

/// Result type alias using the Linkstore error type.
pub type Result<T> = std::result::Result<T, Error>;
