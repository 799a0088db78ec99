//! # Vaultline Contracts
//!
//! An upgradeable custody vault. One storage region per instance, three
//! generations of code that take turns interpreting it:
//!
//! - **V1**: deposits with a basis-point fee, withdrawals, roles.
//! - **V2**: time-weighted yield on credited balances, pausable deposits.
//! - **V3**: two-phase delayed withdrawals with an emergency full exit.
//!
//! The business logic is the easy part. The hard part is that every
//! generation reads bytes the previous one wrote, positionally, with no
//! schema travelling alongside them. [`layout`] pins every field to a slot
//! and proves each version only appends; [`initializer`] makes sure each
//! version's setup runs once, in order, and never on a template.
//!
//! ## Module Map
//!
//! - [`layout`]: field positions per version, append-only verification.
//! - [`state`]: typed accessors over a [`StorageRegion`].
//! - [`access`]: role registry (ADMIN, UPGRADER, PAUSER).
//! - [`initializer`]: the monotonic setup gate.
//! - [`guard`]: the per-instance reentrancy lock.
//! - [`token`]: the external token seam and checked transfers.
//! - [`env`]: the execution context one call runs in.
//! - [`call`]: the call surface and its outputs.
//! - [`vault`]: the three logic versions.
//! - [`proxy`]: the indirection runtime that routes calls and upgrades.
//!
//! ## Design Principles
//!
//! 1. Every call is all-or-nothing. A failed call leaves storage and events
//!    exactly where they were.
//! 2. Money arithmetic is checked. Overflow is an error, never a wrap.
//! 3. Debit before transfer. The lock does the rest.
//!
//! [`StorageRegion`]: vaultline_protocol::StorageRegion

pub mod access;
pub mod call;
pub mod env;
pub mod error;
pub mod events;
pub mod guard;
pub mod initializer;
pub mod layout;
pub mod proxy;
pub mod state;
pub mod token;
pub mod vault;

pub use access::Role;
pub use call::{Call, Output, VaultParams, WithdrawalRequest};
pub use error::{ErrorKind, VaultError};
pub use events::VaultEvent;
pub use layout::{LayoutError, LayoutReport, StorageLayout};
pub use proxy::{RuntimeError, VaultRuntime};
pub use token::{Token, TokenFault};
pub use vault::{ImplementationVersion, VaultLogic};
