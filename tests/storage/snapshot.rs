//! Integration tests for snapshots
//!
//! Tests lookups, typed access, iteration order, and facades.

use linkstore_foundation::{EntitySource, ErrorKind};
use linkstore_storage::{EntityData, EntityStorageSnapshot};

use crate::fixtures::{NamedEntity, OwnedEntity, WithSoftLinkEntity, name_id, source};

// =============================================================================
// Lookups
// =============================================================================

#[test]
fn round_trip_returns_equal_data() {
    let data = NamedEntity {
        name: "core".into(),
        payload: 17,
    };
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let id = builder.add_entity(data.clone(), source()).unwrap();
    let snapshot = builder.commit().unwrap();

    let entity = snapshot.entity::<NamedEntity>(id).unwrap();
    assert_eq!(entity.data().unwrap(), &data);
}

#[test]
fn resolve_by_persistent_id() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let id = builder.add_entity(NamedEntity::new("core"), source()).unwrap();
    let snapshot = builder.commit().unwrap();

    assert_eq!(snapshot.resolve(&name_id("core")).unwrap().id(), id);
    let typed = snapshot.resolve_as::<NamedEntity>(&name_id("core")).unwrap();
    assert_eq!(typed.data().unwrap().name, "core");

    let err = snapshot.resolve(&name_id("missing")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn typed_lookup_with_wrong_type_fails() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let id = builder.add_entity(NamedEntity::new("core"), source()).unwrap();
    let snapshot = builder.commit().unwrap();

    let err = snapshot.entity::<WithSoftLinkEntity>(id).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::TypeMismatch { expected, actual }
            if expected == WithSoftLinkEntity::TYPE && actual == NamedEntity::TYPE
    ));
}

#[test]
fn removed_then_reused_slot_is_stale() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let old = builder.add_entity(NamedEntity::new("old"), source()).unwrap();
    let early = builder.commit().unwrap();

    builder.remove_entity(old).unwrap();
    let new = builder.add_entity(NamedEntity::new("new"), source()).unwrap();
    let late = builder.commit().unwrap();

    assert_eq!(old.index, new.index);
    assert!(late.get(old).unwrap_err().is_stale());
    assert_eq!(late.entity::<NamedEntity>(new).unwrap().data().unwrap().name, "new");
    assert_eq!(early.entity::<NamedEntity>(old).unwrap().data().unwrap().name, "old");
}

// =============================================================================
// Iteration
// =============================================================================

#[test]
fn entities_of_type_follow_insertion_order() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let names = ["delta", "alpha", "charlie", "bravo"];
    for name in names {
        builder.add_entity(NamedEntity::new(name), source()).unwrap();
    }
    builder
        .add_entity(WithSoftLinkEntity::new("alpha"), source())
        .unwrap();
    let snapshot = builder.commit().unwrap();

    let seen: Vec<_> = snapshot
        .entities_of_type::<NamedEntity>()
        .map(|e| e.data().unwrap().name.clone())
        .collect();
    assert_eq!(seen, names);
    assert_eq!(snapshot.entities_of_type_id(WithSoftLinkEntity::TYPE).count(), 1);
    assert_eq!(snapshot.entities().count(), 5);
}

#[test]
fn iteration_order_survives_slot_reuse() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let a = builder.add_entity(NamedEntity::new("a"), source()).unwrap();
    builder.add_entity(NamedEntity::new("b"), source()).unwrap();
    builder.remove_entity(a).unwrap();
    builder.add_entity(NamedEntity::new("c"), source()).unwrap();
    let snapshot = builder.commit().unwrap();

    let seen: Vec<_> = snapshot
        .entities_of_type::<NamedEntity>()
        .map(|e| e.data().unwrap().name.clone())
        .collect();
    assert_eq!(seen, ["b", "c"]);
}

#[test]
fn entities_by_source() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let gradle = EntitySource::new("gradle");
    let maven = EntitySource::new("maven");
    builder.add_entity(NamedEntity::new("a"), gradle.clone()).unwrap();
    builder.add_entity(NamedEntity::new("b"), maven.clone()).unwrap();
    builder.add_entity(NamedEntity::new("c"), gradle.clone()).unwrap();
    let snapshot = builder.commit().unwrap();

    assert_eq!(snapshot.entities_by_source(&gradle).count(), 2);
    assert_eq!(snapshot.entities_by_source(&maven).count(), 1);
    let b = snapshot.resolve(&name_id("b")).unwrap();
    assert_eq!(b.source().unwrap(), &maven);
}

// =============================================================================
// Facades
// =============================================================================

#[test]
fn facades_expose_links_and_ownership() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let owner = builder.add_entity(NamedEntity::new("owner"), source()).unwrap();
    let owned = builder
        .add_entity(OwnedEntity::new(owner, "root"), source())
        .unwrap();
    let linker = builder
        .add_entity(WithSoftLinkEntity::new("owner"), source())
        .unwrap();
    let snapshot = builder.commit().unwrap();

    let owner_view = snapshot.get(owner).unwrap();
    assert_eq!(owner_view.persistent_id().unwrap(), Some(name_id("owner")));
    assert_eq!(owner_view.children().unwrap()[0].id(), owned);
    assert_eq!(owner_view.referrers().unwrap()[0].id(), linker);

    let linker_view = snapshot.get(linker).unwrap();
    assert_eq!(linker_view.soft_links().unwrap(), vec![name_id("owner")]);
    assert_eq!(linker_view.persistent_id().unwrap(), None);

    let owned_view = snapshot.entity::<OwnedEntity>(owned).unwrap();
    assert_eq!(owned_view.parent().unwrap().unwrap().id(), owner);
}

#[test]
fn facade_rebind_follows_live_entities() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    let id = builder.add_entity(NamedEntity::new("a"), source()).unwrap();
    let first = builder.commit().unwrap();

    builder
        .modify_entity::<NamedEntity, _>(id, |e| e.payload = 1)
        .unwrap();
    let second = builder.commit().unwrap();

    let old_view = first.entity::<NamedEntity>(id).unwrap();
    let new_view = old_view.rebind(&second).unwrap();
    assert_eq!(old_view.data().unwrap().payload, 0);
    assert_eq!(new_view.data().unwrap().payload, 1);
}

#[test]
fn snapshots_are_shareable_across_threads() {
    let mut builder = EntityStorageSnapshot::empty().to_builder();
    for i in 0..100 {
        builder
            .add_entity(NamedEntity::new(&format!("e{i}")), source())
            .unwrap();
    }
    let snapshot = builder.commit().unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let snapshot = snapshot.clone();
            scope.spawn(move || {
                assert_eq!(snapshot.entities_of_type::<NamedEntity>().count(), 100);
                assert!(snapshot.resolve(&name_id("e42")).is_ok());
            });
        }
    });
}
