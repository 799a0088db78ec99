// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vaultline Protocol: Chain Primitives
//!
//! The ground floor that Vaultline contracts stand on. Nothing in here knows
//! what a vault is; it only knows what a chain gives every contract:
//! identities, one persistent storage region per instance, a token ledger
//! to hold value in, and a clock that only moves forward.
//!
//! ## Architecture
//!
//! - **address**: 20-byte principal identities. Hex in, hex out.
//! - **hash**: BLAKE3 helpers for slot and identifier derivation.
//! - **storage**: Slot-addressed storage regions and their sled persistence.
//! - **ledger**: In-memory fungible token ledger (the external token).
//! - **clock**: Block timestamps in unix seconds.
//! - **config**: Protocol constants. Every magic number lives there.
//! - **logging**: `tracing` subscriber setup.
//!
//! ## Design Philosophy
//!
//! 1. Storage is positional. A slot means what its number says it means,
//!    forever. Contracts above this layer must treat layouts as append-only.
//! 2. All amounts are `u64` in smallest units; arithmetic is checked.
//! 3. If it touches money, it has tests. Plural.

pub mod address;
pub mod clock;
pub mod config;
pub mod hash;
pub mod ledger;
pub mod logging;
pub mod storage;

pub use address::Address;
pub use clock::BlockClock;
pub use ledger::{FungibleLedger, LedgerError};
pub use storage::{RegionDb, SlotKey, StorageRegion, Word};
