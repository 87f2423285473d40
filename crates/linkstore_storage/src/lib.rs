//! Snapshot-based entity storage with soft links for Linkstore.
//!
//! This crate provides:
//! - [`EntityData`] / [`SoftLinkable`] - Entity types and their soft-link capability
//! - [`EntityStorageSnapshot`] - Immutable, thread-shareable view of all entities
//! - [`EntityStorageBuilder`] - Copy-on-write transaction producing new snapshots
//! - [`AnyEntity`] / [`Entity`] - Generation-checked read-only facades
//! - [`ChangeSet`] - Structural diff between two snapshots
//! - [`EntityStorage`] - Current-snapshot service with change notification

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod arena;
mod builder;
mod changes;
mod config;
mod data;
mod facade;
mod index;
mod snapshot;
mod state;
mod storage;

#[cfg(test)]
mod fixtures;

pub use builder::EntityStorageBuilder;
pub use changes::{ChangeSet, EntityChange};
pub use config::StorageConfig;
pub use data::{EntityData, SoftLinkable};
pub use facade::{AnyEntity, Entity};
pub use snapshot::EntityStorageSnapshot;
pub use storage::{ChangeEvent, ChangeListener, EntityStorage, ListenerId};
