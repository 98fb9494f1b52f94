//! Node references and the non-prefix node variants.
//!
//! Nodes live in per-family pools owned by the [`Art`](crate::Art); a
//! [`NodeRef`] names a node by variant tag and slot index, or by the block
//! location it was persisted at when it has not been loaded yet.

use smallvec::SmallVec;

use crate::error::Result;
use crate::storage::{BlockLocation, MetaBlockReader, MetaBlockWriter};

/// The variant of a node, persisted as one byte ahead of its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeTag {
    /// A run of compressed key bytes.
    Prefix = 1,
    /// Row ids for a fully consumed key.
    Leaf = 2,
    /// Branch with up to 4 children.
    Node4 = 3,
    /// Branch with 5-16 children.
    Node16 = 4,
    /// Branch with 17-48 children.
    Node48 = 5,
    /// Branch with 49-256 children.
    Node256 = 6,
}

impl NodeTag {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(NodeTag::Prefix),
            2 => Some(NodeTag::Leaf),
            3 => Some(NodeTag::Node4),
            4 => Some(NodeTag::Node16),
            5 => Some(NodeTag::Node48),
            6 => Some(NodeTag::Node256),
            _ => None,
        }
    }

    #[inline]
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            NodeTag::Node4 | NodeTag::Node16 | NodeTag::Node48 | NodeTag::Node256
        )
    }

    /// Smallest branch variant that holds `children` entries.
    pub fn for_fanout(children: usize) -> Self {
        match children {
            0..=4 => NodeTag::Node4,
            5..=16 => NodeTag::Node16,
            17..=48 => NodeTag::Node48,
            _ => NodeTag::Node256,
        }
    }
}

/// A resident node: its variant and its slot in that variant's pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    tag: NodeTag,
    index: u32,
}

impl NodeHandle {
    pub(crate) fn new(tag: NodeTag, index: u32) -> Self {
        Self { tag, index }
    }

    #[inline]
    pub fn tag(self) -> NodeTag {
        self.tag
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Reference from a parent (or a prefix node) to the node that follows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// No node.
    #[default]
    Unset,
    /// A node loaded in memory.
    Resident(NodeHandle),
    /// A node still on disk; must be materialized before it is followed.
    Swizzled(BlockLocation),
}

impl NodeRef {
    pub(crate) fn resident(tag: NodeTag, index: u32) -> Self {
        NodeRef::Resident(NodeHandle::new(tag, index))
    }

    /// Reference read back from storage; the invalid location means unset.
    pub fn from_location(location: BlockLocation) -> Self {
        if location.is_valid() {
            NodeRef::Swizzled(location)
        } else {
            NodeRef::Unset
        }
    }

    #[inline]
    pub fn is_set(self) -> bool {
        !matches!(self, NodeRef::Unset)
    }

    #[inline]
    pub fn is_swizzled(self) -> bool {
        matches!(self, NodeRef::Swizzled(_))
    }

    #[inline]
    pub fn is_resident(self) -> bool {
        matches!(self, NodeRef::Resident(_))
    }

    /// Variant of a resident node. Swizzled nodes have no known tag until
    /// they are materialized.
    #[inline]
    pub fn tag(self) -> Option<NodeTag> {
        match self {
            NodeRef::Resident(handle) => Some(handle.tag),
            _ => None,
        }
    }

    #[inline]
    pub fn is_prefix(self) -> bool {
        self.tag() == Some(NodeTag::Prefix)
    }

    #[inline]
    pub fn handle(self) -> Option<NodeHandle> {
        match self {
            NodeRef::Resident(handle) => Some(handle),
            _ => None,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = NodeRef::Unset;
    }

    /// Detach the referenced node, leaving this reference unset.
    #[inline]
    pub fn take(&mut self) -> NodeRef {
        std::mem::take(self)
    }
}

/// Row ids stored under a fully consumed key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Leaf {
    row_ids: SmallVec<[u64; 1]>,
}

impl Leaf {
    pub fn new(row_id: u64) -> Self {
        let mut row_ids = SmallVec::new();
        row_ids.push(row_id);
        Self { row_ids }
    }

    pub fn push(&mut self, row_id: u64) {
        self.row_ids.push(row_id);
    }

    pub fn row_ids(&self) -> &[u64] {
        &self.row_ids
    }

    pub(crate) fn serialize(&self, writer: &mut MetaBlockWriter<'_>) -> Result<BlockLocation> {
        let location = writer.reserve_location()?;
        writer.write(NodeTag::Leaf as u8)?;
        writer.write(self.row_ids.len() as u32)?;
        for &row_id in &self.row_ids {
            writer.write(row_id)?;
        }
        Ok(location)
    }

    pub(crate) fn deserialize(reader: &mut MetaBlockReader<'_>) -> Result<Self> {
        // The count is untrusted; let a corrupt one run into the end of the
        // chain instead of sizing an allocation.
        let count = reader.read::<u32>()?;
        let mut row_ids = SmallVec::new();
        for _ in 0..count {
            row_ids.push(reader.read::<u64>()?);
        }
        Ok(Self { row_ids })
    }
}

/// A branching node: children keyed by one byte, kept sorted by that byte.
///
/// The fan-out variant is carried in the handle's tag and follows
/// [`NodeTag::for_fanout`].
#[derive(Clone, Debug, Default)]
pub struct Branch {
    keys: SmallVec<[u8; 4]>,
    children: SmallVec<[NodeRef; 4]>,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn child(&self, byte: u8) -> Option<NodeRef> {
        self.keys
            .binary_search(&byte)
            .ok()
            .map(|pos| self.children[pos])
    }

    pub fn child_mut(&mut self, byte: u8) -> Option<&mut NodeRef> {
        match self.keys.binary_search(&byte) {
            Ok(pos) => Some(&mut self.children[pos]),
            Err(_) => None,
        }
    }

    /// Insert or replace the child for `byte`, returning the replaced child.
    pub fn insert(&mut self, byte: u8, child: NodeRef) -> Option<NodeRef> {
        match self.keys.binary_search(&byte) {
            Ok(pos) => Some(std::mem::replace(&mut self.children[pos], child)),
            Err(pos) => {
                self.keys.insert(pos, byte);
                self.children.insert(pos, child);
                None
            }
        }
    }

    pub fn remove(&mut self, byte: u8) -> Option<NodeRef> {
        let pos = self.keys.binary_search(&byte).ok()?;
        self.keys.remove(pos);
        Some(self.children.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, NodeRef)> + '_ {
        self.keys.iter().copied().zip(self.children.iter().copied())
    }

    pub(crate) fn into_children(self) -> SmallVec<[NodeRef; 4]> {
        self.children
    }

    /// Write the branch given the already written locations of its children,
    /// in key order.
    pub(crate) fn serialize(
        &self,
        tag: NodeTag,
        child_locations: &[BlockLocation],
        writer: &mut MetaBlockWriter<'_>,
    ) -> Result<BlockLocation> {
        debug_assert_eq!(child_locations.len(), self.keys.len());
        let location = writer.reserve_location()?;
        writer.write(tag as u8)?;
        writer.write(self.keys.len() as u16)?;
        writer.write_bytes(&self.keys)?;
        for &child in child_locations {
            writer.write_location(child)?;
        }
        Ok(location)
    }

    pub(crate) fn deserialize(reader: &mut MetaBlockReader<'_>) -> Result<Self> {
        let count = reader.read::<u16>()?;
        let mut keys = SmallVec::new();
        for _ in 0..count {
            keys.push(reader.read::<u8>()?);
        }
        let mut children = SmallVec::new();
        for _ in 0..count {
            children.push(NodeRef::from_location(reader.read_location()?));
        }
        Ok(Self { keys, children })
    }
}
