//! Prefix node serialization.
//!
//! Layout of one node: tag (u8), count (u8), `count` key bytes, then the
//! successor's location as block id (u64) and offset (u32). Nodes are written
//! after their successor so every stored location points backwards.

use smallvec::SmallVec;

use super::{prefix_index, PrefixNode};
use crate::art::Art;
use crate::error::{Error, Result};
use crate::node::{NodeRef, NodeTag};
use crate::storage::{BlockLocation, MetaBlockReader, MetaBlockWriter};

impl Art {
    /// Write the chain starting at prefix node `index`, then whatever ends
    /// it, and return the location of the head.
    pub(crate) fn serialize_prefix(
        &self,
        index: u32,
        writer: &mut MetaBlockWriter<'_>,
    ) -> Result<BlockLocation> {
        let mut chain: SmallVec<[u32; 8]> = SmallVec::new();
        let mut cursor = NodeRef::resident(NodeTag::Prefix, index);
        while cursor.is_prefix() {
            let index = prefix_index(cursor);
            chain.push(index);
            cursor = self.prefix(index).next;
        }

        let mut location = self.serialize(cursor, writer)?;
        for &index in chain.iter().rev() {
            location = self.prefix(index).serialize(location, writer)?;
        }
        Ok(location)
    }
}

impl PrefixNode {
    fn serialize(
        &self,
        next: BlockLocation,
        writer: &mut MetaBlockWriter<'_>,
    ) -> Result<BlockLocation> {
        let location = writer.reserve_location()?;
        writer.write(NodeTag::Prefix as u8)?;
        writer.write(self.count)?;
        writer.write_bytes(self.bytes())?;
        writer.write_location(next)?;
        Ok(location)
    }

    /// Read a node whose tag has already been consumed. The successor comes
    /// back swizzled.
    pub(crate) fn deserialize(
        reader: &mut MetaBlockReader<'_>,
        capacity: usize,
    ) -> Result<Self> {
        let count = reader.read::<u8>()? as usize;
        if count == 0 || count > capacity {
            return Err(Error::PrefixOverflow { count, capacity });
        }
        let mut node = Self::empty();
        reader.read_bytes(&mut node.bytes[..count])?;
        node.count = count as u8;
        node.next = NodeRef::from_location(reader.read_location()?);
        Ok(node)
    }
}
