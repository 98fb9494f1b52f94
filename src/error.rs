//! Error type shared by the storage and persistence paths.
//!
//! Structural operations on well-formed chains never fail on their own; they
//! return `Result` only because following a swizzled reference may have to
//! read from a block manager.

use std::io;

use thiserror::Error;

use crate::storage::{BlockId, BlockLocation};

/// Errors surfaced by the prefix layer and its storage collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A reader ran past the last block of a meta block chain.
    #[error("unexpected end of block chain in block {block}")]
    Truncated {
        /// Last block of the chain.
        block: BlockId,
    },

    /// A block id that the manager never allocated.
    #[error("block {0} does not exist")]
    UnknownBlock(BlockId),

    /// A location whose offset falls outside the data area of its block.
    #[error("offset {offset} is out of range for block {block}")]
    InvalidOffset {
        /// Block the location points into.
        block: BlockId,
        /// Offending offset.
        offset: u32,
    },

    /// A persisted node started with a byte that is not a node tag.
    #[error("unknown node tag {tag:#04x} at {location}")]
    UnknownTag {
        /// Byte found where the tag was expected.
        tag: u8,
        /// Location of the node.
        location: BlockLocation,
    },

    /// A persisted prefix node holds zero bytes or more than this tree allows.
    #[error("prefix node holds {count} bytes, capacity is {capacity}")]
    PrefixOverflow {
        /// Stored count.
        count: usize,
        /// Capacity configured for the loading tree.
        capacity: usize,
    },

    /// A swizzled reference was followed but no block manager is attached.
    #[error("no block manager attached")]
    NoBlockManager,

    /// A block buffer handed to a manager has the wrong length.
    #[error("block buffer has {actual} bytes, expected {expected}")]
    BlockSizeMismatch {
        /// Manager block size.
        expected: usize,
        /// Buffer length.
        actual: usize,
    },

    /// A block file whose length is not a multiple of the block size.
    #[error("file length {len} is not a multiple of block size {block_size}")]
    InvalidFileLength {
        /// File length in bytes.
        len: u64,
        /// Expected block size.
        block_size: usize,
    },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for the prefix layer.
pub type Result<T> = std::result::Result<T, Error>;
