//! Prefix nodes: runs of key bytes shared by every key below a tree position.
//!
//! A run longer than one node's capacity is stored as a chain of prefix nodes
//! linked through their successor, ending at the first non-prefix node. Every
//! node reachable from a tree holds between 1 and the configured capacity
//! bytes; an empty node exists only between allocation and its first append.
//!
//! Operations are split by concern:
//! - this module: layout, construction, append, inspection
//! - `traverse`: comparing a chain with another chain or with a key
//! - `mutate`: split, reduce and concatenate
//! - `persist`: serialization to meta blocks

mod mutate;
mod persist;
mod traverse;

pub use traverse::{ChainComparison, ChainOutcome, Side};

use std::fmt::Write;

use crate::art::Art;
use crate::config::MAX_PREFIX_CAPACITY;
use crate::error::Result;
use crate::key::ArtKey;
use crate::node::{NodeRef, NodeTag};

/// Inline byte buffer, its fill count and the node that follows the bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixNode {
    bytes: [u8; MAX_PREFIX_CAPACITY],
    count: u8,
    next: NodeRef,
}

impl PrefixNode {
    pub(crate) fn empty() -> Self {
        Self {
            bytes: [0; MAX_PREFIX_CAPACITY],
            count: 0,
            next: NodeRef::Unset,
        }
    }

    fn from_bytes(bytes: &[u8], next: NodeRef) -> Self {
        let mut node = Self::empty();
        node.bytes[..bytes.len()].copy_from_slice(bytes);
        node.count = bytes.len() as u8;
        node.next = next;
        node
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.count as usize]
    }

    /// The node following this one's bytes. May still be swizzled.
    #[inline]
    pub fn successor(&self) -> NodeRef {
        self.next
    }

    #[inline]
    fn push(&mut self, byte: u8) {
        self.bytes[self.count as usize] = byte;
        self.count += 1;
    }
}

/// Pool index of a resident prefix node.
///
/// # Panics
/// Panics if `node` is not a resident prefix node.
#[inline]
pub(crate) fn prefix_index(node: NodeRef) -> u32 {
    match node.handle() {
        Some(handle) if handle.tag() == NodeTag::Prefix => handle.index(),
        _ => panic!("expected a resident prefix node, found {node:?}"),
    }
}

impl Art {
    #[inline]
    pub(crate) fn prefix(&self, index: u32) -> &PrefixNode {
        self.nodes.prefixes.get(index)
    }

    #[inline]
    pub(crate) fn prefix_mut(&mut self, index: u32) -> &mut PrefixNode {
        self.nodes.prefixes.get_mut(index)
    }

    fn alloc_prefix(&mut self, node: PrefixNode) -> NodeRef {
        let index = self.nodes.prefixes.alloc(node);
        NodeRef::resident(NodeTag::Prefix, index)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Allocate an empty prefix node with no successor. It must receive at
    /// least one byte before it becomes reachable from a tree.
    pub fn new_prefix(&mut self) -> NodeRef {
        self.alloc_prefix(PrefixNode::empty())
    }

    /// Allocate a one-byte prefix node followed by `next`.
    pub fn new_prefix_with_byte(&mut self, byte: u8, next: NodeRef) -> NodeRef {
        self.alloc_prefix(PrefixNode::from_bytes(&[byte], next))
    }

    /// Build a chain holding `key[depth..depth + len]`, followed by `next`,
    /// and return its head.
    ///
    /// Every node but the last is full. With `len == 0` nothing is allocated
    /// and `next` is returned as is.
    ///
    /// # Panics
    /// Panics if the range runs past the end of the key.
    pub fn new_prefix_from_key(
        &mut self,
        key: &ArtKey,
        depth: usize,
        len: usize,
        next: NodeRef,
    ) -> NodeRef {
        if len == 0 {
            return next;
        }
        assert!(
            depth + len <= key.len(),
            "prefix range {depth}..{} exceeds key of length {}",
            depth + len,
            key.len()
        );

        // Built back to front so each node is allocated with its successor.
        let capacity = self.prefix_capacity();
        let mut head = next;
        for chunk in key.as_bytes()[depth..depth + len].chunks(capacity).rev() {
            head = self.alloc_prefix(PrefixNode::from_bytes(chunk, head));
        }
        head
    }

    // =========================================================================
    // Append
    // =========================================================================

    /// Append one byte to a prefix node and return the node it landed in.
    ///
    /// A full node gets a new continuation node that takes over its
    /// successor; later appends must go through the returned reference.
    pub fn append_byte(&mut self, node: NodeRef, byte: u8) -> NodeRef {
        let index = prefix_index(node);
        let capacity = self.prefix_capacity();
        let prefix = self.prefix_mut(index);
        if prefix.count() < capacity {
            prefix.push(byte);
            return node;
        }

        let continuation = PrefixNode::from_bytes(&[byte], prefix.next);
        let continuation = self.alloc_prefix(continuation);
        self.prefix_mut(index).next = continuation;
        continuation
    }

    /// Fold the chain `other` onto the end of `node`.
    ///
    /// Each prefix node of `other` is copied byte by byte and then released;
    /// the first non-prefix node of `other` becomes the final successor, so
    /// the result never ends in a prefix node. `node` must be the tail of its
    /// chain; its current successor is replaced.
    pub fn append_chain(&mut self, node: NodeRef, mut other: NodeRef) -> Result<()> {
        self.materialize(&mut other)?;
        let mut tail = node;
        while other.is_prefix() {
            let other_index = prefix_index(other);
            let source = *self.prefix(other_index);
            for &byte in source.bytes() {
                tail = self.append_byte(tail, byte);
            }

            let mut next = source.next;
            self.materialize(&mut next)?;
            self.prefix_mut(prefix_index(tail)).next = next;
            self.nodes.prefixes.free(other_index);
            other = next;
        }
        self.prefix_mut(prefix_index(tail)).next = other;
        Ok(())
    }

    // =========================================================================
    // Successors
    // =========================================================================

    /// Replace the successor of a prefix node without freeing the old one.
    pub fn set_successor(&mut self, node: NodeRef, next: NodeRef) {
        self.prefix_mut(prefix_index(node)).next = next;
    }

    pub fn successor(&self, node: NodeRef) -> NodeRef {
        self.prefix(prefix_index(node)).next
    }

    /// Materialize the successor of a prefix node in place and return it.
    pub(crate) fn resolve_next(&mut self, index: u32) -> Result<NodeRef> {
        let mut next = self.prefix(index).next;
        if next.is_swizzled() {
            self.materialize(&mut next)?;
            self.prefix_mut(index).next = next;
        }
        Ok(next)
    }

    /// Last prefix node of the chain starting at `node`.
    pub fn chain_tail(&mut self, node: NodeRef) -> Result<NodeRef> {
        let mut tail = node;
        loop {
            let next = self.resolve_next(prefix_index(tail))?;
            if !next.is_prefix() {
                return Ok(tail);
            }
            tail = next;
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The prefix node behind `node`, if it is a resident prefix.
    pub fn prefix_node(&self, node: NodeRef) -> Option<&PrefixNode> {
        match node.handle() {
            Some(handle) if handle.tag() == NodeTag::Prefix => Some(self.prefix(handle.index())),
            _ => None,
        }
    }

    /// All bytes of the chain starting at `node`, loading it as needed.
    /// A non-prefix `node` yields no bytes.
    pub fn chain_bytes(&mut self, node: &mut NodeRef) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.walk_chain(node, |prefix| bytes.extend_from_slice(prefix.bytes()))?;
        Ok(bytes)
    }

    /// Number of prefix nodes in the chain starting at `node`.
    pub fn chain_len(&mut self, node: &mut NodeRef) -> Result<usize> {
        let mut len = 0;
        self.walk_chain(node, |_| len += 1)?;
        Ok(len)
    }

    fn walk_chain(&mut self, node: &mut NodeRef, mut visit: impl FnMut(&PrefixNode)) -> Result<()> {
        self.materialize(node)?;
        let mut cursor = *node;
        while cursor.is_prefix() {
            let index = prefix_index(cursor);
            visit(self.prefix(index));
            cursor = self.resolve_next(index)?;
        }
        Ok(())
    }

    /// ` prefix_bytes:[b0-b1-...] ` for each node of the chain, followed by
    /// the rendering of the node ending it.
    pub(crate) fn render_prefix(&self, index: u32) -> String {
        let mut out = String::new();
        let mut cursor = NodeRef::resident(NodeTag::Prefix, index);
        while cursor.is_prefix() {
            let prefix = self.prefix(prefix_index(cursor));
            out.push_str(" prefix_bytes:[");
            for byte in prefix.bytes() {
                let _ = write!(out, "{byte}-");
            }
            out.push_str("] ");
            cursor = prefix.next;
        }
        out.push_str(&self.render(cursor));
        out
    }
}
