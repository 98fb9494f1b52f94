//! Sequential writer and reader over chains of blocks.

use super::{
    BlockId, BlockLocation, BlockManager, Primitive, BLOCK_HEADER_SIZE, INVALID_BLOCK,
};
use crate::error::{Error, Result};

/// Appends primitives to a chain of blocks, allocating blocks as it goes.
///
/// The block being filled lives in memory until it is full or [`flush`] is
/// called; callers must flush after the last write.
///
/// [`flush`]: MetaBlockWriter::flush
pub struct MetaBlockWriter<'a> {
    manager: &'a dyn BlockManager,
    block: BlockId,
    buf: Vec<u8>,
    pos: usize,
}

impl<'a> MetaBlockWriter<'a> {
    /// Start a new chain in a freshly allocated block.
    pub fn new(manager: &'a dyn BlockManager) -> Result<Self> {
        let block = manager.allocate()?;
        let mut buf = vec![0u8; manager.block_size()];
        INVALID_BLOCK.encode(&mut buf[..BLOCK_HEADER_SIZE]);
        Ok(Self {
            manager,
            block,
            buf,
            pos: BLOCK_HEADER_SIZE,
        })
    }

    /// Location the next write will land at.
    ///
    /// Moves to a new block first if the current one has no room left, so the
    /// returned location always addresses a real byte.
    pub fn reserve_location(&mut self) -> Result<BlockLocation> {
        if self.pos == self.buf.len() {
            self.next_block()?;
        }
        Ok(BlockLocation::new(self.block, self.pos as u32))
    }

    pub fn write<P: Primitive>(&mut self, value: P) -> Result<()> {
        let mut raw = [0u8; 8];
        value.encode(&mut raw);
        self.write_bytes(&raw[..P::SIZE])
    }

    pub fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if self.pos == self.buf.len() {
                self.next_block()?;
            }
            let n = data.len().min(self.buf.len() - self.pos);
            self.buf[self.pos..self.pos + n].copy_from_slice(&data[..n]);
            self.pos += n;
            data = &data[n..];
        }
        Ok(())
    }

    /// Persist the block currently being filled. Safe to call repeatedly.
    pub fn flush(&mut self) -> Result<()> {
        self.manager.write_block(self.block, &self.buf)
    }

    /// Block currently being filled.
    pub fn block_id(&self) -> BlockId {
        self.block
    }

    fn next_block(&mut self) -> Result<()> {
        let next = self.manager.allocate()?;
        next.encode(&mut self.buf[..BLOCK_HEADER_SIZE]);
        self.flush()?;

        self.buf.fill(0);
        INVALID_BLOCK.encode(&mut self.buf[..BLOCK_HEADER_SIZE]);
        self.block = next;
        self.pos = BLOCK_HEADER_SIZE;
        Ok(())
    }
}

/// Reads primitives from a chain of blocks starting at a given location.
pub struct MetaBlockReader<'a> {
    manager: &'a dyn BlockManager,
    block: BlockId,
    data: Vec<u8>,
    pos: usize,
}

impl<'a> MetaBlockReader<'a> {
    pub fn open(manager: &'a dyn BlockManager, location: BlockLocation) -> Result<Self> {
        let data = manager.read_block(location.block_id)?;
        let offset = location.offset as usize;
        if offset < BLOCK_HEADER_SIZE || offset > data.len() {
            return Err(Error::InvalidOffset {
                block: location.block_id,
                offset: location.offset,
            });
        }
        Ok(Self {
            manager,
            block: location.block_id,
            data,
            pos: offset,
        })
    }

    pub fn read<P: Primitive>(&mut self) -> Result<P> {
        let mut raw = [0u8; 8];
        self.read_bytes(&mut raw[..P::SIZE])?;
        Ok(P::decode(&raw))
    }

    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.data.len() {
                self.next_block()?;
            }
            let n = (out.len() - filled).min(self.data.len() - self.pos);
            out[filled..filled + n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }

    /// Read a location written as a block id followed by an offset.
    pub fn read_location(&mut self) -> Result<BlockLocation> {
        let block_id = self.read::<u64>()?;
        let offset = self.read::<u32>()?;
        Ok(BlockLocation::new(block_id, offset))
    }

    fn next_block(&mut self) -> Result<()> {
        let next = u64::decode(&self.data[..BLOCK_HEADER_SIZE]);
        if next == INVALID_BLOCK {
            return Err(Error::Truncated { block: self.block });
        }
        self.data = self.manager.read_block(next)?;
        self.block = next;
        self.pos = BLOCK_HEADER_SIZE;
        Ok(())
    }
}

impl MetaBlockWriter<'_> {
    /// Write a location as a block id followed by an offset.
    pub fn write_location(&mut self, location: BlockLocation) -> Result<()> {
        self.write(location.block_id)?;
        self.write(location.offset)
    }
}
