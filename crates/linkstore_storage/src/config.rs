//! Configuration for entity storage.

/// Configuration shared by builders and the [`EntityStorage`] service.
///
/// [`EntityStorage`]: crate::EntityStorage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Validate every indexed soft link at commit, not only the links the
    /// transaction could have broken.
    pub full_link_validation: bool,

    /// Number of superseded snapshots retained by the service.
    pub history_size: usize,

    /// Notify listeners even when a commit changed nothing.
    pub notify_empty_changes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            full_link_validation: false,
            history_size: 16,
            notify_empty_changes: false,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration that validates every soft link on each commit.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            full_link_validation: true,
            ..Self::default()
        }
    }

    /// Builder method to set full link validation.
    #[must_use]
    pub fn with_full_link_validation(mut self, enabled: bool) -> Self {
        self.full_link_validation = enabled;
        self
    }

    /// Builder method to set the history size.
    #[must_use]
    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Builder method to notify listeners of empty commits.
    #[must_use]
    pub fn with_notify_empty_changes(mut self, enabled: bool) -> Self {
        self.notify_empty_changes = enabled;
        self
    }
}
