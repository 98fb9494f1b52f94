//! Block manager keeping every block in memory.

use parking_lot::RwLock;

use super::{BlockId, BlockManager, MIN_BLOCK_SIZE};
use crate::error::{Error, Result};

/// In-memory block store, mostly useful for tests and for trees that are
/// swizzled out only to bound their resident size.
pub struct MemoryBlockManager {
    block_size: usize,
    blocks: RwLock<Vec<Box<[u8]>>>,
}

impl MemoryBlockManager {
    pub fn new(block_size: usize) -> Result<Self> {
        validate_block_size(block_size)?;
        Ok(Self {
            block_size,
            blocks: RwLock::new(Vec::new()),
        })
    }

    /// Total bytes held by allocated blocks.
    pub fn memory_usage(&self) -> usize {
        self.blocks.read().len() * self.block_size
    }
}

impl BlockManager for MemoryBlockManager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate(&self) -> Result<BlockId> {
        let mut blocks = self.blocks.write();
        let id = blocks.len() as BlockId;
        blocks.push(vec![0u8; self.block_size].into_boxed_slice());
        Ok(id)
    }

    fn write_block(&self, id: BlockId, data: &[u8]) -> Result<()> {
        if data.len() != self.block_size {
            return Err(Error::BlockSizeMismatch {
                expected: self.block_size,
                actual: data.len(),
            });
        }
        let mut blocks = self.blocks.write();
        let block = blocks
            .get_mut(id as usize)
            .ok_or(Error::UnknownBlock(id))?;
        block.copy_from_slice(data);
        Ok(())
    }

    fn read_block(&self, id: BlockId) -> Result<Vec<u8>> {
        let blocks = self.blocks.read();
        blocks
            .get(id as usize)
            .map(|block| block.to_vec())
            .ok_or(Error::UnknownBlock(id))
    }

    fn block_count(&self) -> u64 {
        self.blocks.read().len() as u64
    }
}

pub(super) fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size < MIN_BLOCK_SIZE {
        return Err(Error::InvalidConfig(format!(
            "block size must be at least {MIN_BLOCK_SIZE}, got {block_size}"
        )));
    }
    Ok(())
}
