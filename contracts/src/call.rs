//! # Call Surface
//!
//! Everything a caller can ask a vault instance to do, as data. The proxy
//! forwards a [`Call`] to whatever code is active; the code either answers
//! with an [`Output`] or refuses with a [`crate::VaultError`].

use serde::{Deserialize, Serialize};
use vaultline_protocol::Address;

use crate::access::Role;
use crate::vault::ImplementationVersion;

/// Binding parameters of `setupV1`.
///
/// Deserializable so deployments can be described in JSON:
///
/// ```json
/// { "token": "0x…", "admin": "0x…", "deposit_fee_bps": 50 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultParams {
    /// The token ledger the instance holds custody in. Immutable afterwards.
    pub token: Address,
    /// Receives ADMIN and UPGRADER.
    pub admin: Address,
    /// Deposit fee, `[0, 10000]`.
    pub deposit_fee_bps: u16,
}

impl VaultParams {
    /// Parses parameters from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A principal's outstanding two-phase withdrawal. All-zero means none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: u64,
    pub requested_at: u64,
}

impl WithdrawalRequest {
    /// Whether a request is outstanding.
    pub fn is_pending(&self) -> bool {
        self.amount > 0
    }
}

/// One call into a vault instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    // Setup
    SetupV1(VaultParams),
    SetupV2,
    SetupV3,
    InitializedVersion,
    ImplementationVersion,

    // Access control
    GrantRole { role: Role, account: Address },
    RevokeRole { role: Role, account: Address },
    RenounceRole { role: Role },
    HasRole { role: Role, account: Address },

    // V1
    Deposit { amount: u64 },
    Withdraw { amount: u64 },
    BalanceOf { account: Address },
    TotalDeposits,
    DepositFee,

    // V2
    SetYieldRate { bps: u16 },
    YieldRate,
    PendingYield { account: Address },
    ClaimYield,
    PauseDeposits,
    UnpauseDeposits,
    IsDepositsPaused,

    // V3
    SetWithdrawalDelay { seconds: u64 },
    WithdrawalDelay,
    RequestWithdrawal { amount: u64 },
    ExecuteWithdrawal,
    EmergencyWithdraw,
    GetWithdrawalRequest { account: Address },
}

impl Call {
    /// The external name of the call, as it appears in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::SetupV1(_) => "setupV1",
            Call::SetupV2 => "setupV2",
            Call::SetupV3 => "setupV3",
            Call::InitializedVersion => "initializedVersion",
            Call::ImplementationVersion => "implementationVersion",
            Call::GrantRole { .. } => "grantRole",
            Call::RevokeRole { .. } => "revokeRole",
            Call::RenounceRole { .. } => "renounceRole",
            Call::HasRole { .. } => "hasRole",
            Call::Deposit { .. } => "deposit",
            Call::Withdraw { .. } => "withdraw",
            Call::BalanceOf { .. } => "balanceOf",
            Call::TotalDeposits => "totalDeposits",
            Call::DepositFee => "depositFee",
            Call::SetYieldRate { .. } => "setYieldRate",
            Call::YieldRate => "getYieldRate",
            Call::PendingYield { .. } => "pendingYield",
            Call::ClaimYield => "claimYield",
            Call::PauseDeposits => "pauseDeposits",
            Call::UnpauseDeposits => "unpauseDeposits",
            Call::IsDepositsPaused => "isDepositsPaused",
            Call::SetWithdrawalDelay { .. } => "setWithdrawalDelay",
            Call::WithdrawalDelay => "getWithdrawalDelay",
            Call::RequestWithdrawal { .. } => "requestWithdrawal",
            Call::ExecuteWithdrawal => "executeWithdrawal",
            Call::EmergencyWithdraw => "emergencyWithdraw",
            Call::GetWithdrawalRequest { .. } => "getWithdrawalRequest",
        }
    }

    /// The schema version a setup call advances to, if this is one.
    pub fn setup_target(&self) -> Option<u8> {
        match self {
            Call::SetupV1(_) => Some(1),
            Call::SetupV2 => Some(2),
            Call::SetupV3 => Some(3),
            _ => None,
        }
    }

    /// Whether the call only reads.
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Call::InitializedVersion
                | Call::ImplementationVersion
                | Call::HasRole { .. }
                | Call::BalanceOf { .. }
                | Call::TotalDeposits
                | Call::DepositFee
                | Call::YieldRate
                | Call::PendingYield { .. }
                | Call::IsDepositsPaused
                | Call::WithdrawalDelay
                | Call::GetWithdrawalRequest { .. }
        )
    }
}

/// What a successful call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    Unit,
    Amount(u64),
    Bool(bool),
    Bps(u16),
    Seconds(u64),
    Schema(u8),
    Version(ImplementationVersion),
    Request(WithdrawalRequest),
}

impl Output {
    pub fn amount(self) -> Option<u64> {
        match self {
            Output::Amount(v) => Some(v),
            _ => None,
        }
    }

    pub fn flag(self) -> Option<bool> {
        match self {
            Output::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn bps(self) -> Option<u16> {
        match self {
            Output::Bps(v) => Some(v),
            _ => None,
        }
    }

    pub fn seconds(self) -> Option<u64> {
        match self {
            Output::Seconds(v) => Some(v),
            _ => None,
        }
    }

    pub fn schema(self) -> Option<u8> {
        match self {
            Output::Schema(v) => Some(v),
            _ => None,
        }
    }

    pub fn version(self) -> Option<ImplementationVersion> {
        match self {
            Output::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn request(self) -> Option<WithdrawalRequest> {
        match self {
            Output::Request(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
