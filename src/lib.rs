//! # art-prefix
//!
//! Prefix compression for an Adaptive Radix Tree index over binary-comparable
//! keys.
//!
//! Runs of key bytes shared by every key below a tree position are stored in
//! chains of fixed-capacity prefix nodes, so the tree only branches where keys
//! actually diverge. This crate provides those nodes and the operations an
//! index needs to keep them consistent while it inserts, deletes and
//! checkpoints: construction, comparison against keys and other chains,
//! split, reduce, concatenate, append, and lazy loading from block storage.
//!
//! ## Example
//!
//! ```rust
//! use art_prefix::{Art, ArtConfig, ArtKey};
//!
//! let mut art = Art::new(ArtConfig::default().with_prefix_capacity(4)).unwrap();
//! let key = ArtKey::from_bytes(&[10, 20, 30, 40, 50, 60]);
//! let leaf = art.new_leaf(7);
//! let mut head = art.new_prefix_from_key(&key, 0, key.len(), leaf);
//! assert_eq!(art.chain_len(&mut head).unwrap(), 2);
//!
//! let mut cursor = head;
//! let mut depth = 0;
//! assert_eq!(art.traverse_key(&mut cursor, &key, &mut depth).unwrap(), None);
//! assert_eq!((depth, cursor), (6, leaf));
//!
//! art.reduce(&mut head, 1).unwrap();
//! assert_eq!(art.chain_bytes(&mut head).unwrap(), vec![30, 40, 50, 60]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod allocator;
mod art;
mod config;
mod error;
mod key;
mod node;
mod prefix;
pub mod storage;

pub use allocator::{AllocatorStats, NodeAllocator, Pool};
pub use art::Art;
pub use config::{ArtConfig, MAX_PREFIX_CAPACITY};
pub use error::{Error, Result};
pub use key::ArtKey;
pub use node::{Branch, Leaf, NodeHandle, NodeRef, NodeTag};
pub use prefix::{ChainComparison, ChainOutcome, PrefixNode, Side};

#[cfg(test)]
mod proptests;
