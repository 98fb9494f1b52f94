//! The tree context shared by every node operation.
//!
//! [`Art`] owns the node pools and, optionally, the block manager that
//! persisted nodes are loaded from. The surrounding index drives inserts,
//! deletes and lookups; this type only supplies the node-level entry points
//! they are built from.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::allocator::{AllocatorStats, NodeAllocator};
use crate::config::ArtConfig;
use crate::error::{Error, Result};
use crate::node::{Branch, Leaf, NodeRef, NodeTag};
use crate::prefix::PrefixNode;
use crate::storage::{BlockLocation, BlockManager, MetaBlockReader, MetaBlockWriter};

/// Node storage and persistence context for one adaptive radix tree.
pub struct Art {
    config: ArtConfig,
    pub(crate) nodes: NodeAllocator,
    blocks: Option<Arc<dyn BlockManager>>,
}

impl Art {
    /// Create an in-memory tree context with no storage attached.
    pub fn new(config: ArtConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            nodes: NodeAllocator::with_capacity(config.initial_capacity),
            config,
            blocks: None,
        })
    }

    /// Create a tree context that persists to and loads from `blocks`.
    pub fn with_block_manager(config: ArtConfig, blocks: Arc<dyn BlockManager>) -> Result<Self> {
        let mut art = Self::new(config)?;
        art.blocks = Some(blocks);
        Ok(art)
    }

    pub fn attach_block_manager(&mut self, blocks: Arc<dyn BlockManager>) {
        self.blocks = Some(blocks);
    }

    pub fn block_manager(&self) -> Option<&Arc<dyn BlockManager>> {
        self.blocks.as_ref()
    }

    pub fn config(&self) -> &ArtConfig {
        &self.config
    }

    /// Bytes stored per prefix node.
    #[inline]
    pub fn prefix_capacity(&self) -> usize {
        self.config.prefix_capacity
    }

    pub fn stats(&self) -> AllocatorStats {
        self.nodes.stats()
    }

    // =========================================================================
    // Leaves and branches
    // =========================================================================

    pub fn new_leaf(&mut self, row_id: u64) -> NodeRef {
        let index = self.nodes.leaves.alloc(Leaf::new(row_id));
        NodeRef::resident(NodeTag::Leaf, index)
    }

    pub fn leaf(&self, node: NodeRef) -> Option<&Leaf> {
        match node.handle() {
            Some(handle) if handle.tag() == NodeTag::Leaf => {
                Some(self.nodes.leaves.get(handle.index()))
            }
            _ => None,
        }
    }

    pub fn leaf_mut(&mut self, node: NodeRef) -> Option<&mut Leaf> {
        match node.handle() {
            Some(handle) if handle.tag() == NodeTag::Leaf => {
                Some(self.nodes.leaves.get_mut(handle.index()))
            }
            _ => None,
        }
    }

    /// Allocate an empty Node4.
    pub fn new_branch(&mut self) -> NodeRef {
        let index = self.nodes.branches.alloc(Branch::new());
        NodeRef::resident(NodeTag::Node4, index)
    }

    pub fn branch(&self, node: NodeRef) -> Option<&Branch> {
        match node.handle() {
            Some(handle) if handle.tag().is_branch() => {
                Some(self.nodes.branches.get(handle.index()))
            }
            _ => None,
        }
    }

    /// Insert or replace a child of a resident branch, moving the branch to
    /// the variant matching its new fan-out. Returns the replaced child.
    pub fn insert_child(
        &mut self,
        node: &mut NodeRef,
        byte: u8,
        child: NodeRef,
    ) -> Option<NodeRef> {
        let handle = match node.handle() {
            Some(handle) if handle.tag().is_branch() => handle,
            _ => panic!("insert_child on non-branch node {node:?}"),
        };
        let branch = self.nodes.branches.get_mut(handle.index());
        let replaced = branch.insert(byte, child);
        *node = NodeRef::resident(NodeTag::for_fanout(branch.len()), handle.index());
        replaced
    }

    /// Detach a child of a resident branch without freeing it.
    pub fn remove_child(&mut self, node: &mut NodeRef, byte: u8) -> Option<NodeRef> {
        let handle = match node.handle() {
            Some(handle) if handle.tag().is_branch() => handle,
            _ => panic!("remove_child on non-branch node {node:?}"),
        };
        let branch = self.nodes.branches.get_mut(handle.index());
        let removed = branch.remove(byte);
        *node = NodeRef::resident(NodeTag::for_fanout(branch.len()), handle.index());
        removed
    }

    // =========================================================================
    // Free
    // =========================================================================

    /// Free `node` and everything it owns, leaving the reference unset.
    ///
    /// Prefix chains are walked iteratively; each prefix node's successor is
    /// freed after it. Swizzled references own no memory and are only reset.
    pub fn free(&mut self, node: &mut NodeRef) {
        let mut current = node.take();
        while let NodeRef::Resident(handle) = current {
            match handle.tag() {
                NodeTag::Prefix => {
                    current = self.nodes.prefixes.free(handle.index()).successor();
                }
                NodeTag::Leaf => {
                    self.nodes.leaves.free(handle.index());
                    return;
                }
                NodeTag::Node4 | NodeTag::Node16 | NodeTag::Node48 | NodeTag::Node256 => {
                    let branch = self.nodes.branches.free(handle.index());
                    for mut child in branch.into_children() {
                        self.free(&mut child);
                    }
                    return;
                }
            }
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load a swizzled node into memory, replacing the reference with a
    /// resident handle. Its own successors stay swizzled.
    ///
    /// Unset and resident references are left untouched.
    pub fn materialize(&mut self, node: &mut NodeRef) -> Result<()> {
        let NodeRef::Swizzled(location) = *node else {
            return Ok(());
        };
        let blocks = self.blocks.clone().ok_or(Error::NoBlockManager)?;
        let mut reader = MetaBlockReader::open(blocks.as_ref(), location)?;

        let raw = reader.read::<u8>()?;
        let tag = NodeTag::from_u8(raw).ok_or(Error::UnknownTag { tag: raw, location })?;
        let index = match tag {
            NodeTag::Prefix => {
                let prefix = PrefixNode::deserialize(&mut reader, self.prefix_capacity())?;
                self.nodes.prefixes.alloc(prefix)
            }
            NodeTag::Leaf => self.nodes.leaves.alloc(Leaf::deserialize(&mut reader)?),
            NodeTag::Node4 | NodeTag::Node16 | NodeTag::Node48 | NodeTag::Node256 => {
                self.nodes.branches.alloc(Branch::deserialize(&mut reader)?)
            }
        };

        debug!(%location, ?tag, index, "materialized node");
        *node = NodeRef::resident(tag, index);
        Ok(())
    }

    /// Serialize `node` and everything below it, children first, returning
    /// the location the node itself was written at.
    ///
    /// Swizzled references are already on disk and return their location
    /// unchanged; unset references return [`BlockLocation::INVALID`].
    pub fn serialize(
        &self,
        node: NodeRef,
        writer: &mut MetaBlockWriter<'_>,
    ) -> Result<BlockLocation> {
        let handle = match node {
            NodeRef::Unset => return Ok(BlockLocation::INVALID),
            NodeRef::Swizzled(location) => return Ok(location),
            NodeRef::Resident(handle) => handle,
        };
        match handle.tag() {
            NodeTag::Prefix => self.serialize_prefix(handle.index(), writer),
            NodeTag::Leaf => self.nodes.leaves.get(handle.index()).serialize(writer),
            tag => {
                let branch = self.nodes.branches.get(handle.index());
                let children = branch
                    .iter()
                    .map(|(_, child)| self.serialize(child, writer))
                    .collect::<Result<SmallVec<[BlockLocation; 4]>>>()?;
                branch.serialize(tag, &children, writer)
            }
        }
    }

    /// Write the subtree under `root` to the attached block manager.
    pub fn checkpoint(&self, root: NodeRef) -> Result<BlockLocation> {
        let blocks = self.blocks.as_ref().ok_or(Error::NoBlockManager)?;
        let mut writer = MetaBlockWriter::new(blocks.as_ref())?;
        let location = self.serialize(root, &mut writer)?;
        writer.flush()?;
        debug!(%location, last_block = writer.block_id(), "checkpointed subtree");
        Ok(location)
    }

    /// Reference to a checkpointed subtree; nothing is read until it is
    /// materialized.
    pub fn load(&self, location: BlockLocation) -> NodeRef {
        debug!(%location, "loading swizzled root");
        NodeRef::from_location(location)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Human-readable rendering of `node` and everything resident below it.
    pub fn render(&self, node: NodeRef) -> String {
        let handle = match node {
            NodeRef::Unset => return String::new(),
            NodeRef::Swizzled(location) => return format!("swizzled({location})"),
            NodeRef::Resident(handle) => handle,
        };
        match handle.tag() {
            NodeTag::Prefix => self.render_prefix(handle.index()),
            NodeTag::Leaf => {
                let leaf = self.nodes.leaves.get(handle.index());
                let ids: Vec<String> = leaf.row_ids().iter().map(u64::to_string).collect();
                format!("Leaf [{}]", ids.join(", "))
            }
            tag => {
                let branch = self.nodes.branches.get(handle.index());
                let children: Vec<String> = branch
                    .iter()
                    .map(|(byte, child)| format!("{byte}:{}", self.render(child)))
                    .collect();
                format!("{tag:?} [{}]", children.join(", "))
            }
        }
    }
}
