//! # Vault Errors
//!
//! One error type for everything a vault call can refuse. Each variant
//! belongs to exactly one [`ErrorKind`], so callers that only care about the
//! class of failure never have to match the long tail.

use thiserror::Error;
use vaultline_protocol::storage::RegionError;
use vaultline_protocol::Address;

use crate::access::Role;
use crate::layout::LayoutError;
use crate::token::TokenFault;
use crate::vault::ImplementationVersion;

/// The failure classes a caller can distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, missing role, wrong state. The caller can fix it.
    PreconditionViolation,
    /// The token refused, returned false, or moved the wrong amount.
    ExternalTransferFailure,
    /// A guarded operation was entered while another one was running.
    ReentrancyViolation,
    /// A setup step ran twice, out of order, or on a template.
    InitializationOrderViolation,
    /// Crediting yield would promise more than the vault holds.
    SolvencyViolation,
}

/// Errors surfaced by vault calls and runtime operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    // -- Preconditions -------------------------------------------------------
    /// Amount arguments must be positive.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The caller's credited balance does not cover the request.
    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        /// Credited balance at the time of the call.
        available: u64,
        /// Amount the call needed.
        requested: u64,
    },

    /// A basis-point parameter exceeded 10000.
    #[error("{parameter} out of range: {value} bps exceeds 10000")]
    BpsOutOfRange {
        /// Which parameter.
        parameter: &'static str,
        /// The rejected value.
        value: u16,
    },

    /// Withdrawal delay outside `[1 hour, 30 days]`.
    #[error("withdrawal delay out of range: {seconds}s not within [{min}, {max}]")]
    DelayOutOfRange {
        /// The rejected value.
        seconds: u64,
        /// Lower bound, inclusive.
        min: u64,
        /// Upper bound, inclusive.
        max: u64,
    },

    /// The pending request is not executable yet.
    #[error("withdrawal delay not elapsed: ready at {ready_at}, now {now}")]
    DelayNotElapsed {
        /// Earliest timestamp the request can execute.
        ready_at: u64,
        /// Current block timestamp.
        now: u64,
    },

    /// `executeWithdrawal` with nothing requested.
    #[error("no pending withdrawal request")]
    NoPendingWithdrawal,

    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {account} lacks role {role}")]
    Unauthorized {
        /// Required role.
        role: Role,
        /// The caller.
        account: Address,
    },

    /// Deposits are paused.
    #[error("deposits are paused")]
    DepositsPaused,

    /// The instance has not reached the schema this operation reads.
    #[error("not initialized: operation needs schema {required}, instance is at {current}")]
    NotInitialized {
        /// Schema version the operation needs.
        required: u8,
        /// Schema version the instance is at.
        current: u8,
    },

    /// A binding parameter was the zero address.
    #[error("{parameter} must not be the zero address")]
    ZeroAddress {
        /// Which parameter.
        parameter: &'static str,
    },

    /// The active code does not expose this call.
    #[error("{implementation} does not support {call}")]
    UnsupportedCall {
        /// Call name.
        call: &'static str,
        /// The active implementation.
        implementation: ImplementationVersion,
    },

    /// Checked arithmetic on an amount overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// A packed field access fell outside its slot.
    #[error("storage access failed: {0}")]
    Storage(#[from] RegionError),

    /// No proxy instance lives at this address.
    #[error("unknown instance: {0}")]
    UnknownInstance(Address),

    /// No implementation is deployed at this address.
    #[error("unknown implementation: {0}")]
    UnknownImplementation(Address),

    /// The new implementation does not append-only extend the active one.
    #[error("incompatible storage layout: {0}")]
    IncompatibleLayout(#[from] LayoutError),

    // -- External transfers --------------------------------------------------
    /// The token call failed outright.
    #[error("token transfer failed: {0}")]
    TransferFailed(#[from] TokenFault),

    /// The token call returned `false`.
    #[error("token {operation} returned false")]
    TransferReturnedFalse {
        /// `transfer` or `transferFrom`.
        operation: &'static str,
    },

    /// The vault's token balance moved by something other than the amount.
    #[error("token transfer moved {actual}, expected {expected}")]
    TransferShortfall {
        /// Amount the call asked for.
        expected: u64,
        /// Amount the vault's balance actually moved by.
        actual: u64,
    },

    /// The runtime's token is not the one this instance was bound to.
    #[error("token mismatch: instance bound to {bound}, runtime holds {provided}")]
    TokenMismatch {
        /// Token recorded at setup.
        bound: Address,
        /// Token the call was routed through.
        provided: Address,
    },

    // -- Reentrancy ----------------------------------------------------------
    /// A guarded operation was re-entered.
    #[error("reentrant call")]
    ReentrantCall,

    // -- Initialization order ------------------------------------------------
    /// The requested setup already ran, or the instance is a template.
    #[error("already initialized: instance is at {current}, setup targets {requested}")]
    AlreadyInitialized {
        /// Current initialized version.
        current: u8,
        /// Version the setup would advance to.
        requested: u8,
    },

    /// The setup skips a version.
    #[error("setup out of order: instance is at {current}, setup targets {requested}")]
    SetupOutOfOrder {
        /// Current initialized version.
        current: u8,
        /// Version the setup would advance to.
        requested: u8,
    },

    /// The active code predates the requested setup.
    #[error("not yet upgraded: setup for schema {requested} needs newer code than {implementation}")]
    NotYetUpgraded {
        /// Version the setup would advance to.
        requested: u8,
        /// The active implementation.
        implementation: ImplementationVersion,
    },

    // -- Solvency ------------------------------------------------------------
    /// Token reserves do not cover credited balances plus the new yield.
    #[error("insufficient reserves: vault holds {held}, obligations would be {required}")]
    InsufficientReserves {
        /// Token balance held by the vault.
        held: u64,
        /// `totalCredited + yield`.
        required: u64,
    },
}

impl VaultError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        use VaultError::*;
        match self {
            ZeroAmount
            | InsufficientBalance { .. }
            | BpsOutOfRange { .. }
            | DelayOutOfRange { .. }
            | DelayNotElapsed { .. }
            | NoPendingWithdrawal
            | Unauthorized { .. }
            | DepositsPaused
            | NotInitialized { .. }
            | ZeroAddress { .. }
            | UnsupportedCall { .. }
            | ArithmeticOverflow
            | Storage(_)
            | UnknownInstance(_)
            | UnknownImplementation(_)
            | IncompatibleLayout(_) => ErrorKind::PreconditionViolation,

            TransferFailed(_)
            | TransferReturnedFalse { .. }
            | TransferShortfall { .. }
            | TokenMismatch { .. } => ErrorKind::ExternalTransferFailure,

            ReentrantCall => ErrorKind::ReentrancyViolation,

            AlreadyInitialized { .. } | SetupOutOfOrder { .. } | NotYetUpgraded { .. } => {
                ErrorKind::InitializationOrderViolation
            }

            InsufficientReserves { .. } => ErrorKind::SolvencyViolation,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(VaultError::ZeroAmount.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(
            VaultError::Unauthorized {
                role: Role::Pauser,
                account: Address::derive("mallory"),
            }
            .kind(),
            ErrorKind::PreconditionViolation
        );
        assert_eq!(
            VaultError::TransferReturnedFalse { operation: "transfer" }.kind(),
            ErrorKind::ExternalTransferFailure
        );
        assert_eq!(VaultError::ReentrantCall.kind(), ErrorKind::ReentrancyViolation);
        assert_eq!(
            VaultError::NotYetUpgraded {
                requested: 2,
                implementation: ImplementationVersion::V1,
            }
            .kind(),
            ErrorKind::InitializationOrderViolation
        );
        assert_eq!(
            VaultError::InsufficientReserves { held: 1, required: 2 }.kind(),
            ErrorKind::SolvencyViolation
        );
    }

    #[test]
    fn messages_carry_values() {
        let err = VaultError::DelayNotElapsed {
            ready_at: 5_000,
            now: 4_000,
        };
        assert_eq!(
            err.to_string(),
            "withdrawal delay not elapsed: ready at 5000, now 4000"
        );

        let err = VaultError::UnsupportedCall {
            call: "claimYield",
            implementation: ImplementationVersion::V1,
        };
        assert_eq!(err.to_string(), "V1 does not support claimYield");
    }
}
