//! Integration tests for Layer 1: Storage
//!
//! Tests for snapshots, builders, soft-link rewriting, change sets, and the
//! storage service.

mod changes;
mod fixtures;
mod snapshot;
