//! # Vault Logic
//!
//! Three generations of code over one storage region. Each generation is a
//! layer on the one before it:
//!
//! - [`v1`]: VaultCore: setup, roles, deposit/withdraw, fee math.
//! - [`v2`]: YieldEngine: yield accrual and claiming, pausable deposits.
//!   Its deposit wraps V1's.
//! - [`v3`]: DelayedWithdrawalEngine: request/execute, emergency exit.
//!
//! [`logic`] ties them together behind the [`VaultLogic`] trait the proxy
//! dispatches through.

pub mod logic;
pub mod v1;
pub mod v2;
pub mod v3;

pub use logic::{ImplementationVersion, VaultLogic, VaultV1, VaultV2, VaultV3};
