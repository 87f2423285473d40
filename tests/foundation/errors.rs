//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use linkstore_foundation::{
    DanglingLink, EntityId, EntityLookup, EntitySource, EntityTypeId, Error, ErrorContext,
    ErrorKind, PersistentId,
};

const MODULE: EntityTypeId = EntityTypeId::new(1);

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_entity_not_found() {
    let id = EntityId::new(MODULE, 42, 1);
    let err = Error::entity_not_found(id);
    assert!(matches!(
        err.kind,
        ErrorKind::EntityNotFound(EntityLookup::Id(found)) if found == id
    ));
    assert!(err.is_not_found());
    assert!(!err.is_stale());
}

#[test]
fn error_unresolved_persistent_id() {
    let err = Error::unresolved(PersistentId::new(MODULE, "Foo"));
    assert!(err.is_not_found());
    assert!(format!("{err}").contains("Foo"));
}

#[test]
fn error_stale_entity() {
    let err = Error::stale_entity(EntityId::new(MODULE, 0, 2));
    assert!(err.is_stale());
    assert!(format!("{err}").contains("stale"));
}

#[test]
fn error_duplicate_persistent_id() {
    let existing = EntityId::new(MODULE, 0, 0);
    let err = Error::duplicate_persistent_id(PersistentId::new(MODULE, "X"), existing);
    let msg = format!("{err}");
    assert!(msg.contains("duplicate"));
    assert!(msg.contains('X'));
}

#[test]
fn error_dangling_links_are_listed() {
    let referrer = EntityId::new(EntityTypeId::new(2), 5, 0);
    let err = Error::dangling_soft_links(vec![DanglingLink {
        referrer,
        target: PersistentId::new(MODULE, "gone"),
    }]);

    let links = err.dangling_links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].referrer, referrer);
    assert!(format!("{err}").starts_with("1 dangling soft link(s)"));
}

#[test]
fn error_commit_conflict() {
    let err = Error::commit_conflict(3, 5);
    assert!(matches!(
        err.kind,
        ErrorKind::CommitConflict {
            expected: 3,
            actual: 5
        }
    ));
    assert!(err.dangling_links().is_none());
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn error_with_context() {
    let context = ErrorContext::new()
        .with_operation("modify_entity")
        .with_source(EntitySource::new("gradle import"));
    let err = Error::stale_entity(EntityId::new(MODULE, 0, 0)).with_context(context);

    let context = err.context.as_ref().unwrap();
    assert_eq!(context.operation.as_deref(), Some("modify_entity"));
    assert_eq!(context.source, Some(EntitySource::new("gradle import")));
}
