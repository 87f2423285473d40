//! Symbolic entity identifiers.
//!
//! A [`PersistentId`] is derived from the attributes that define an entity's
//! identity (a module name, a library name scoped by its module, ...). Unlike
//! [`EntityId`](crate::EntityId) it survives commits, slot reuse, and
//! rebuilding the store from scratch, which makes it the only reference type
//! allowed to cross entity boundaries as a soft link.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::EntityTypeId;

/// Separator between composed identity parts.
const PART_SEPARATOR: char = ':';
/// Escape character for separators occurring inside a part.
const PART_ESCAPE: char = '\\';

/// Stable, value-equal symbolic identifier of an entity.
///
/// The identifier names the entity type it resolves to, so resolving it can
/// only ever produce an entity of that type. Two ids are equal when both the
/// target type and the name are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PersistentId {
    target: EntityTypeId,
    name: Arc<str>,
}

impl PersistentId {
    /// Creates an id for an entity of type `target` identified by `name`.
    #[must_use]
    pub fn new(target: EntityTypeId, name: impl Into<Arc<str>>) -> Self {
        Self {
            target,
            name: name.into(),
        }
    }

    /// Creates an id from several identity-defining parts.
    ///
    /// Parts are joined with `:`; separators and escapes inside a part are
    /// escaped so that `["a:b", "c"]` and `["a", "b:c"]` never collide.
    #[must_use]
    pub fn compose<S: AsRef<str>>(target: EntityTypeId, parts: &[S]) -> Self {
        let mut name = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                name.push(PART_SEPARATOR);
            }
            for c in part.as_ref().chars() {
                if c == PART_SEPARATOR || c == PART_ESCAPE {
                    name.push(PART_ESCAPE);
                }
                name.push(c);
            }
        }
        Self::new(target, name)
    }

    /// Returns the entity type this id resolves to.
    #[must_use]
    pub fn target(&self) -> EntityTypeId {
        self.target
    }

    /// Returns the encoded name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Splits a composed name back into its parts.
    #[must_use]
    pub fn parts(&self) -> Vec<String> {
        let mut parts = vec![String::new()];
        let mut escaped = false;
        for c in self.name.chars() {
            if escaped {
                escaped = false;
            } else if c == PART_ESCAPE {
                escaped = true;
                continue;
            } else if c == PART_SEPARATOR {
                parts.push(String::new());
                continue;
            }
            if let Some(last) = parts.last_mut() {
                last.push(c);
            }
        }
        parts
    }

    /// Returns the last identity part, which is what users usually see.
    #[must_use]
    pub fn presentable_name(&self) -> String {
        self.parts().pop().unwrap_or_default()
    }
}

impl fmt::Debug for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersistentId({}, {:?})", self.target, self.name)
    }
}

impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.target, self.name)
    }
}
