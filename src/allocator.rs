//! Slab pools for node storage.
//!
//! Each node family has its own pool of slots addressed by 32-bit indices.
//! Freed slots go onto a free list and are handed out again before the pool
//! grows, so allocation and free are both O(1) and indices stay stable for the
//! lifetime of a node.

use crate::node::{Branch, Leaf};
use crate::prefix::PrefixNode;

/// A pool of `T` slots with a LIFO free list.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Store `value` and return its slot index.
    pub fn alloc(&mut self, value: T) -> u32 {
        if let Some(index) = self.free.pop() {
            debug_assert!(self.slots[index as usize].is_none());
            self.slots[index as usize] = Some(value);
            return index;
        }
        let index = self.slots.len();
        assert!(index < u32::MAX as usize, "node pool exhausted");
        self.slots.push(Some(value));
        index as u32
    }

    /// Release a slot and return what it held.
    ///
    /// # Panics
    /// Panics if the slot is not live.
    pub fn free(&mut self, index: u32) -> T {
        let value = self.slots[index as usize]
            .take()
            .unwrap_or_else(|| panic!("double free of node slot {index}"));
        self.free.push(index);
        value
    }

    #[inline]
    pub fn get(&self, index: u32) -> &T {
        self.slots[index as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("access to freed node slot {index}"))
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut T {
        self.slots[index as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("access to freed node slot {index}"))
    }

    /// Number of live slots.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of freed slots waiting for reuse.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }
}

/// Live node counts per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub prefix_nodes: usize,
    pub leaf_nodes: usize,
    pub branch_nodes: usize,
    pub free_slots: usize,
}

impl AllocatorStats {
    pub fn live_nodes(&self) -> usize {
        self.prefix_nodes + self.leaf_nodes + self.branch_nodes
    }
}

/// One pool per node family.
#[derive(Clone, Debug)]
pub struct NodeAllocator {
    pub(crate) prefixes: Pool<PrefixNode>,
    pub(crate) leaves: Pool<Leaf>,
    pub(crate) branches: Pool<Branch>,
}

impl NodeAllocator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            prefixes: Pool::with_capacity(capacity),
            leaves: Pool::with_capacity(capacity),
            branches: Pool::with_capacity(capacity),
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            prefix_nodes: self.prefixes.live(),
            leaf_nodes: self.leaves.live(),
            branch_nodes: self.branches.live(),
            free_slots: self.prefixes.free_slots()
                + self.leaves.free_slots()
                + self.branches.free_slots(),
        }
    }
}
