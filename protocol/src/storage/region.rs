//! # Storage Regions
//!
//! A [`StorageRegion`] is the one persistent byte store a contract instance
//! owns. It is addressed by 32-byte [`SlotKey`]s and holds 32-byte
//! [`Word`]s. Unwritten slots read as zero, and writing a zero word erases
//! the entry, so two regions with the same logical contents always compare
//! (and serialize) equal.
//!
//! ## Addressing
//!
//! ```text
//! fixed slot n      key = 0x00..00 || n (8 bytes, big-endian)
//! mapping entry     key = BLAKE3-derive("mapping slot", key_bytes || base)
//! nested mapping    key = mapping(mapping(base, outer), inner)
//! ```
//!
//! Several small fields may share one slot. Each field owns a byte range
//! `[offset, offset + width)` inside the word, and integers are stored
//! big-endian within that range.
//!
//! The region has no idea which field lives where. That knowledge belongs to
//! the contract's storage layout, which is why layouts must never move a
//! field once it has been deployed: the bytes stay put, only their meaning
//! would change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::address::{Address, ADDRESS_LENGTH};
use crate::config::WORD_SIZE;
use crate::hash::{domain_separated_hash_multi, DOMAIN_MAPPING_SLOT};

/// One storage word.
pub type Word = [u8; WORD_SIZE];

/// The all-zero word. Absent slots read as this.
pub const ZERO_WORD: Word = [0u8; WORD_SIZE];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from packed reads and writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// The byte range does not fit inside a word.
    #[error("byte range out of bounds: offset {offset} + width {width} exceeds 32")]
    OutOfBounds {
        /// Start of the range.
        offset: usize,
        /// Length of the range.
        width: usize,
    },

    /// An integer field is wider than a `u64` can hold.
    #[error("integer width {0} exceeds 8 bytes")]
    WidthTooLarge(usize),

    /// The value does not fit into the field's width.
    #[error("value {value} does not fit in {width} bytes")]
    ValueTooWide {
        /// The rejected value.
        value: u64,
        /// Width of the target field.
        width: usize,
    },
}

// ---------------------------------------------------------------------------
// SlotKey
// ---------------------------------------------------------------------------

/// A 32-byte storage slot key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey([u8; 32]);

impl SlotKey {
    /// The key of fixed slot `index`.
    pub const fn fixed(index: u64) -> Self {
        let be = index.to_be_bytes();
        let mut key = [0u8; 32];
        let mut i = 0;
        while i < 8 {
            key[24 + i] = be[i];
            i += 1;
        }
        Self(key)
    }

    /// The key of the mapping entry for `key` under the mapping rooted at
    /// `base`.
    pub fn mapping(base: SlotKey, key: &[u8]) -> Self {
        Self(domain_separated_hash_multi(
            DOMAIN_MAPPING_SLOT,
            &[key, &base.0],
        ))
    }

    /// The key of the mapping entry for an address key.
    pub fn mapping_address(base: SlotKey, key: &Address) -> Self {
        Self::mapping(base, key.as_bytes())
    }

    /// Returns the index if this is a fixed slot key.
    ///
    /// A derived mapping key could in principle have 24 leading zero bytes,
    /// but the odds are 2^-192 and we are not losing sleep over it.
    pub fn fixed_index(&self) -> Option<u64> {
        if self.0[..24].iter().all(|b| *b == 0) {
            let mut be = [0u8; 8];
            be.copy_from_slice(&self.0[24..]);
            Some(u64::from_be_bytes(be))
        } else {
            None
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed_index() {
            Some(index) => write!(f, "SlotKey(#{index})"),
            None => write!(f, "SlotKey({}...)", &hex::encode(self.0)[..12]),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageRegion
// ---------------------------------------------------------------------------

/// The sparse, slot-addressed persistent storage of one contract instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRegion {
    /// Non-zero words keyed by slot.
    slots: BTreeMap<SlotKey, Word>,
}

impl StorageRegion {
    /// Creates an empty region. Every slot reads zero.
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Reads a full word.
    pub fn read_word(&self, slot: SlotKey) -> Word {
        self.slots.get(&slot).copied().unwrap_or(ZERO_WORD)
    }

    /// Writes a full word. Writing zero erases the slot.
    pub fn write_word(&mut self, slot: SlotKey, word: Word) {
        if word == ZERO_WORD {
            self.slots.remove(&slot);
        } else {
            self.slots.insert(slot, word);
        }
    }

    /// Reads `width` bytes starting at `offset` within a slot.
    pub fn read_bytes(&self, slot: SlotKey, offset: usize, width: usize) -> Result<Vec<u8>, RegionError> {
        check_range(offset, width)?;
        let word = self.read_word(slot);
        Ok(word[offset..offset + width].to_vec())
    }

    /// Overwrites the bytes at `offset` within a slot, leaving the rest of
    /// the word untouched.
    pub fn write_bytes(&mut self, slot: SlotKey, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        check_range(offset, data.len())?;
        let mut word = self.read_word(slot);
        word[offset..offset + data.len()].copy_from_slice(data);
        self.write_word(slot, word);
        Ok(())
    }

    /// Reads a big-endian unsigned integer of `width` bytes (at most 8).
    pub fn read_uint(&self, slot: SlotKey, offset: usize, width: usize) -> Result<u64, RegionError> {
        if width > 8 {
            return Err(RegionError::WidthTooLarge(width));
        }
        let bytes = self.read_bytes(slot, offset, width)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Writes a big-endian unsigned integer into `width` bytes (at most 8).
    pub fn write_uint(
        &mut self,
        slot: SlotKey,
        offset: usize,
        width: usize,
        value: u64,
    ) -> Result<(), RegionError> {
        if width > 8 {
            return Err(RegionError::WidthTooLarge(width));
        }
        if width < 8 && value >> (width * 8) != 0 {
            return Err(RegionError::ValueTooWide { value, width });
        }
        let be = value.to_be_bytes();
        self.write_bytes(slot, offset, &be[8 - width..])
    }

    /// Reads a one-byte boolean. Any non-zero byte is `true`.
    pub fn read_bool(&self, slot: SlotKey, offset: usize) -> Result<bool, RegionError> {
        Ok(self.read_uint(slot, offset, 1)? != 0)
    }

    /// Writes a one-byte boolean.
    pub fn write_bool(&mut self, slot: SlotKey, offset: usize, value: bool) -> Result<(), RegionError> {
        self.write_uint(slot, offset, 1, u64::from(value))
    }

    /// Reads a 20-byte address.
    pub fn read_address(&self, slot: SlotKey, offset: usize) -> Result<Address, RegionError> {
        let bytes = self.read_bytes(slot, offset, ADDRESS_LENGTH)?;
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Address::from_bytes(arr))
    }

    /// Writes a 20-byte address.
    pub fn write_address(&mut self, slot: SlotKey, offset: usize, value: &Address) -> Result<(), RegionError> {
        self.write_bytes(slot, offset, value.as_bytes())
    }

    /// Number of non-zero slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if every slot reads zero.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over non-zero slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &Word)> {
        self.slots.iter()
    }

    /// Iterates over the non-zero fixed slots only, as `(index, word)`.
    pub fn fixed_slots(&self) -> impl Iterator<Item = (u64, &Word)> {
        self.slots
            .iter()
            .filter_map(|(key, word)| key.fixed_index().map(|index| (index, word)))
    }
}

fn check_range(offset: usize, width: usize) -> Result<(), RegionError> {
    match offset.checked_add(width) {
        Some(end) if end <= WORD_SIZE => Ok(()),
        _ => Err(RegionError::OutOfBounds { offset, width }),
    }
}
