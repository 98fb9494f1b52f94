//! Tree-wide configuration.

use crate::error::{Error, Result};

/// Largest number of key bytes a single prefix node can hold.
///
/// Every prefix node carries an inline buffer of this size; a tree may be
/// configured to use fewer slots per node.
pub const MAX_PREFIX_CAPACITY: usize = 15;

/// Configuration for an [`Art`](crate::Art).
#[derive(Debug, Clone)]
pub struct ArtConfig {
    /// Bytes stored per prefix node. Fixed for the lifetime of a tree and
    /// must match the capacity used when a persisted tree was written.
    pub prefix_capacity: usize,
    /// Initial slot capacity hint for each node pool.
    pub initial_capacity: usize,
}

impl Default for ArtConfig {
    fn default() -> Self {
        Self {
            prefix_capacity: MAX_PREFIX_CAPACITY,
            initial_capacity: 1024,
        }
    }
}

impl ArtConfig {
    /// Return a copy with the given prefix capacity.
    pub fn with_prefix_capacity(mut self, prefix_capacity: usize) -> Self {
        self.prefix_capacity = prefix_capacity;
        self
    }

    /// Check that the configuration can back a tree.
    pub fn validate(&self) -> Result<()> {
        if self.prefix_capacity == 0 || self.prefix_capacity > MAX_PREFIX_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "prefix_capacity must be in 1..={MAX_PREFIX_CAPACITY}, got {}",
                self.prefix_capacity
            )));
        }
        Ok(())
    }
}
