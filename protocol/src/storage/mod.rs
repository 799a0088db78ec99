//! # Storage Module
//!
//! Persistent storage for Vaultline contract instances.
//!
//! ## Architecture
//!
//! ```text
//! region.rs: Slot-addressed storage region of one instance (in memory)
//! db.rs    : sled persistence for regions and instance metadata
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One region per instance.** Code changes, the region does not.
//!    Upgrades swap the logic that interprets the bytes, never the bytes.
//!
//! 2. **Zero means absent.** A region never stores a zero word, so equal
//!    contents always mean equal serialized bytes.
//!
//! 3. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for events and debugging; bincode is for storage.

pub mod db;
pub mod region;

pub use db::{DbError, RegionDb};
pub use region::{RegionError, SlotKey, StorageRegion, Word, ZERO_WORD};
