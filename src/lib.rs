//! Linkstore - Immutable entity-graph store with soft links
//!
//! This crate re-exports all layers of the Linkstore system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: linkstore_storage    — Snapshots, builders, soft-link rewriting, change sets
//! Layer 0: linkstore_foundation — Identifiers, errors, persistent slot trie
//! ```

pub use linkstore_foundation as foundation;
pub use linkstore_storage as storage;
