//! Binary-comparable keys.
//!
//! An [`ArtKey`] is the byte string the tree indexes. Encodings are chosen so
//! that comparing two keys byte by byte gives the same order as comparing the
//! values they were built from:
//!
//! - Unsigned integers: big-endian.
//! - Signed integers: big-endian with the sign bit flipped.
//! - Floats: sign bit flipped for positives, all bits inverted for negatives.
//! - Text: UTF-8 bytes followed by a `0` terminator.

use std::ops::Index;

use smallvec::SmallVec;

/// An encoded key, indexable by absolute byte position.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtKey {
    data: SmallVec<[u8; 16]>,
}

impl ArtKey {
    /// Wrap raw bytes that are already binary comparable.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: SmallVec::from_slice(bytes),
        }
    }

    pub fn from_u8(value: u8) -> Self {
        Self::from_bytes(&[value])
    }

    pub fn from_u16(value: u16) -> Self {
        Self::from_bytes(&value.to_be_bytes())
    }

    pub fn from_u32(value: u32) -> Self {
        Self::from_bytes(&value.to_be_bytes())
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_bytes(&value.to_be_bytes())
    }

    pub fn from_i32(value: i32) -> Self {
        Self::from_u32((value as u32) ^ (1 << 31))
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_u64((value as u64) ^ (1 << 63))
    }

    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let ordered = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
        Self::from_u64(ordered)
    }

    /// Encode text with a trailing `0` so no key is a strict prefix of another.
    pub fn from_text(text: &str) -> Self {
        let mut data = SmallVec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(0);
        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte at `pos`, or `None` past the end of the key.
    #[inline]
    pub fn get(&self, pos: usize) -> Option<u8> {
        self.data.get(pos).copied()
    }
}

impl Index<usize> for ArtKey {
    type Output = u8;

    #[inline]
    fn index(&self, pos: usize) -> &u8 {
        &self.data[pos]
    }
}

impl From<&[u8]> for ArtKey {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for ArtKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
