//! Integration tests for change sets
//!
//! Tests that snapshot diffs report exactly the entities that changed.

use linkstore_storage::{EntityChange, EntityData, EntityStorageSnapshot};
use proptest::prelude::*;

use crate::fixtures::{NamedEntity, OwnedEntity, WithSoftLinkEntity, source};

#[test]
fn rename_reports_entity_and_referrers() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let foo = builder.add_entity(NamedEntity::new("Foo"), source()).unwrap();
    let linker = builder
        .add_entity(WithSoftLinkEntity::new("Foo"), source())
        .unwrap();
    let bystander = builder.add_entity(NamedEntity::new("Other"), source()).unwrap();
    let before = builder.commit().unwrap();

    builder
        .modify_entity::<NamedEntity, _>(foo, |e| e.name = "Bar".into())
        .unwrap();
    let after = builder.commit().unwrap();

    let changes = after.changes_since(&before);
    assert_eq!(changes.replaced(), &[foo, linker]);
    assert!(changes.added().is_empty());
    assert!(!changes.contains(bystander));
    assert!(changes.touches_type(WithSoftLinkEntity::TYPE));
    assert!(!changes.touches_type(OwnedEntity::TYPE));
}

#[test]
fn changes_span_multiple_commits() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let a = builder.add_entity(NamedEntity::new("a"), source()).unwrap();
    let start = builder.commit().unwrap();

    let b = builder.add_entity(NamedEntity::new("b"), source()).unwrap();
    builder.commit().unwrap();
    builder.remove_entity(a).unwrap();
    let end = builder.commit().unwrap();

    let changes = end.changes_since(&start);
    let all: Vec<_> = changes.changes().collect();
    assert_eq!(all, vec![EntityChange::Removed(a), EntityChange::Added(b)]);
}

#[test]
fn reverse_diff_swaps_added_and_removed() {
    let before = EntityStorageSnapshot::empty();
    let mut builder = before.to_builder();
    let a = builder.add_entity(NamedEntity::new("a"), source()).unwrap();
    let after = builder.commit().unwrap();

    assert_eq!(after.changes_since(&before).added(), &[a]);
    assert_eq!(before.changes_since(&after).removed(), &[a]);
}

#[test]
fn reused_slot_with_new_source_is_remove_and_add() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let a = builder.add_entity(NamedEntity::new("a"), source()).unwrap();
    let before = builder.commit().unwrap();

    builder.remove_entity(a).unwrap();
    let b = builder
        .add_entity(NamedEntity::new("a"), linkstore_foundation::EntitySource::new("other"))
        .unwrap();
    let after = builder.commit().unwrap();

    let changes = after.changes_since(&before);
    assert_eq!(changes.removed(), &[a]);
    assert_eq!(changes.added(), &[b]);
}

proptest! {
    #[test]
    fn diff_matches_payload_edits(
        size in 1usize..200,
        touched in prop::collection::btree_set(0usize..200, 0..20),
    ) {
        let mut builder = EntityStorageSnapshot::empty().to_builder();
        let ids: Vec<_> = (0..size)
            .map(|i| builder.add_entity(NamedEntity::new(&format!("n{i}")), source()).unwrap())
            .collect();
        let before = builder.commit().unwrap();

        let mut expected: Vec<_> = touched
            .iter()
            .filter(|&&i| i < size)
            .map(|&i| ids[i])
            .collect();
        for id in &expected {
            builder
                .modify_entity::<NamedEntity, _>(*id, |e| e.payload += 1)
                .unwrap();
        }
        let after = builder.commit().unwrap();
        expected.sort();

        let changes = after.changes_since(&before);
        prop_assert_eq!(changes.replaced(), expected.as_slice());
        prop_assert_eq!(changes.len(), expected.len());
    }
}
