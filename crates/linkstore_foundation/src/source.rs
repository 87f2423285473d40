//! Entity sources.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Describes where an entity came from (a build file, an importer, a user edit).
///
/// Sources are opaque to the store; collaborators use them to find and
/// replace everything one importer produced.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntitySource(Arc<str>);

impl EntitySource {
    /// Creates a source with the given description.
    #[must_use]
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self(description.into())
    }

    /// Returns the source description.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntitySource({:?})", self.0)
    }
}

impl fmt::Display for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
