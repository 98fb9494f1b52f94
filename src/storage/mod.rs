//! Block storage used to persist and lazily reload trees.
//!
//! Nodes are written into chains of fixed-size blocks ("meta blocks"). Each
//! block begins with an 8-byte header holding the id of the next block in the
//! chain, so a writer can keep appending past the end of a block and a reader
//! can follow it.
//!
//! ```text
//! +----------------+---------------------------------------------+
//! | next id: u64   | data ...                                    |
//! +----------------+---------------------------------------------+
//!   0              8                                  block_size
//! ```

mod file;
mod memory;
mod meta_block;

pub use file::FileBlockManager;
pub use memory::MemoryBlockManager;
pub use meta_block::{MetaBlockReader, MetaBlockWriter};

use std::fmt;

use crate::error::Result;

/// Identifier of one block within a manager.
pub type BlockId = u64;

/// Block id marking "no block".
pub const INVALID_BLOCK: BlockId = u64::MAX;

/// Default block size (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Smallest block size a manager accepts.
pub const MIN_BLOCK_SIZE: usize = 32;

/// Bytes reserved at the start of every block for the next-block link.
pub const BLOCK_HEADER_SIZE: usize = 8;

/// On-disk address of a serialized node: a block plus a byte offset in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockLocation {
    pub block_id: BlockId,
    pub offset: u32,
}

impl BlockLocation {
    /// Location written in place of an unset reference.
    pub const INVALID: BlockLocation = BlockLocation {
        block_id: INVALID_BLOCK,
        offset: 0,
    };

    pub const fn new(block_id: BlockId, offset: u32) -> Self {
        Self { block_id, offset }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.block_id != INVALID_BLOCK
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}@{}", self.block_id, self.offset)
    }
}

/// Fixed-width little-endian values that can be written to blocks.
pub trait Primitive: Copy {
    const SIZE: usize;

    fn encode(self, out: &mut [u8]);

    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($ty:ty),*) => {
        $(
            impl Primitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_primitive!(u8, u16, u32, u64);

/// A store of fixed-size blocks.
///
/// Implementations are shared between the writer used for checkpoints and the
/// readers used to materialize swizzled nodes, hence `Send + Sync`.
pub trait BlockManager: Send + Sync {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Reserve a new zero-filled block.
    fn allocate(&self) -> Result<BlockId>;

    /// Overwrite a whole block. `data` must be exactly `block_size` bytes.
    fn write_block(&self, id: BlockId, data: &[u8]) -> Result<()>;

    /// Read a whole block.
    fn read_block(&self, id: BlockId) -> Result<Vec<u8>>;

    /// Number of blocks allocated so far.
    fn block_count(&self) -> u64;
}
