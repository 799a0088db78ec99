//! # YieldEngine (V2)
//!
//! Simple-interest yield on credited balances, claimed into the ledger (never
//! paid out directly), plus a PAUSER-controlled switch on deposits.
//!
//! ## Accrual
//!
//! ```text
//! pending = floor(balance * rate_bps * (now - last_claim) / (365 days * 10000))
//! ```
//!
//! No compounding, no leap years. The floor matters; callers reconcile
//! against it to the unit.
//!
//! ## First Touch
//!
//! `last_claim == 0` means the yield clock never started for this account.
//! The first claim (or first deposit under V2) starts it and pays nothing,
//! so balances that existed before the upgrade do not collect yield for
//! time that passed before V2 existed.
//!
//! ## Solvency
//!
//! Yield is the only place credited value appears without a matching
//! inflow. Before crediting, the vault's token balance must cover
//! `total_credited + amount`, or the claim fails as a whole.

use vaultline_protocol::config::{BPS_DENOMINATOR, MAX_BPS, SECONDS_PER_YEAR};
use vaultline_protocol::{Address, StorageRegion};

use super::v1::{self, DepositReceipt};
use crate::access::{self, Role};
use crate::call::{Call, Output};
use crate::env::Env;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::guard::{self, nonreentrant};
use crate::initializer;
use crate::state::VaultStorage;
use crate::token;

pub(crate) fn route(env: &mut Env<'_>, call: &Call) -> Option<Result<Output, VaultError>> {
    let result = match call {
        Call::SetupV2 => setup(env).map(|()| Output::Unit),
        Call::Deposit { amount } => deposit(env, *amount).map(|receipt| Output::Amount(receipt.net)),

        Call::SetYieldRate { bps } => set_yield_rate(env, *bps).map(|()| Output::Unit),
        Call::YieldRate => yield_rate(env.storage).map(Output::Bps),
        Call::PendingYield { account } => {
            pending_yield(env.storage, account, env.msg.now).map(Output::Amount)
        }
        Call::ClaimYield => claim_yield(env).map(Output::Amount),

        Call::PauseDeposits => set_paused(env, true).map(|()| Output::Unit),
        Call::UnpauseDeposits => set_paused(env, false).map(|()| Output::Unit),
        Call::IsDepositsPaused => is_deposits_paused(env.storage).map(Output::Bool),
        _ => return None,
    };
    Some(result)
}

/// `setupV2()`: advances the gate. Adds no field defaults.
pub fn setup(env: &mut Env<'_>) -> Result<(), VaultError> {
    initializer::advance(env.storage, 2)?;
    guard::init(env.storage)?;
    tracing::info!(vault = %env.msg.vault, "vault initialized at V2");
    env.emit(VaultEvent::Initialized { version: 2 });
    Ok(())
}

/// `deposit(amount)` with the pause gate and yield-clock bootstrap.
///
/// Until `setupV2` has run the V2 fields are not live, and this behaves
/// exactly like the V1 deposit.
pub fn deposit(env: &mut Env<'_>, amount: u64) -> Result<DepositReceipt, VaultError> {
    nonreentrant(env, |env| {
        let schema = initializer::require_schema(env.storage, 1)?;
        if schema >= 2 && env.storage.deposits_paused()? {
            return Err(VaultError::DepositsPaused);
        }

        let receipt = v1::credit_deposit(env, amount)?;

        let user = env.msg.caller;
        if schema >= 2 && env.storage.last_claim(&user)? == 0 {
            env.storage.set_last_claim(&user, env.msg.now)?;
            tracing::debug!(user = %user, "yield clock started by first deposit");
        }
        Ok(receipt)
    })
}

/// Yield accrued on `balance` at `rate_bps` over `elapsed` seconds.
pub fn accrue(balance: u64, rate_bps: u16, elapsed: u64) -> Result<u64, VaultError> {
    let numerator = u128::from(balance)
        .checked_mul(u128::from(rate_bps))
        .and_then(|v| v.checked_mul(u128::from(elapsed)))
        .ok_or(VaultError::ArithmeticOverflow)?;
    let denominator = u128::from(SECONDS_PER_YEAR) * u128::from(BPS_DENOMINATOR);
    u64::try_from(numerator / denominator).map_err(|_| VaultError::ArithmeticOverflow)
}

/// `pendingYield(account)`.
pub fn pending_yield(storage: &StorageRegion, account: &Address, now: u64) -> Result<u64, VaultError> {
    let balance = storage.balance(account)?;
    let last = storage.last_claim(account)?;
    if balance == 0 || last == 0 {
        return Ok(0);
    }
    accrue(balance, storage.yield_rate_bps()?, now.saturating_sub(last))
}

/// `claimYield()`. Returns the amount credited.
pub fn claim_yield(env: &mut Env<'_>) -> Result<u64, VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 2)?;
        let user = env.msg.caller;
        let now = env.msg.now;

        if env.storage.last_claim(&user)? == 0 {
            env.storage.set_last_claim(&user, now)?;
            tracing::debug!(user = %user, "yield clock started by claim");
            env.emit(VaultEvent::YieldClaimed { user, amount: 0 });
            return Ok(0);
        }

        let amount = pending_yield(env.storage, &user, now)?;
        env.storage.set_last_claim(&user, now)?;

        if amount > 0 {
            let required = env
                .storage
                .total_credited()?
                .checked_add(amount)
                .ok_or(VaultError::ArithmeticOverflow)?;
            let held = token::held_reserves(env)?;
            if held < required {
                tracing::warn!(user = %user, held, required, "yield claim exceeds reserves");
                return Err(VaultError::InsufficientReserves { held, required });
            }
            v1::credit(env, &user, amount)?;
        }

        tracing::debug!(user = %user, amount, "yield claimed");
        env.emit(VaultEvent::YieldClaimed { user, amount });
        Ok(amount)
    })
}

/// `setYieldRate(bps)`: ADMIN only.
pub fn set_yield_rate(env: &mut Env<'_>, bps: u16) -> Result<(), VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 2)?;
        access::require_role(env, Role::Admin)?;
        if bps > MAX_BPS {
            return Err(VaultError::BpsOutOfRange {
                parameter: "yield_rate_bps",
                value: bps,
            });
        }
        env.storage.set_yield_rate_bps(bps)?;
        tracing::info!(bps, "yield rate updated");
        env.emit(VaultEvent::YieldRateUpdated { bps });
        Ok(())
    })
}

/// `pauseDeposits()` / `unpauseDeposits()`: PAUSER only. Idempotent.
pub fn set_paused(env: &mut Env<'_>, paused: bool) -> Result<(), VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 2)?;
        access::require_role(env, Role::Pauser)?;
        env.storage.set_deposits_paused(paused)?;

        let by = env.msg.caller;
        tracing::info!(by = %by, paused, "deposit gate changed");
        env.emit(if paused {
            VaultEvent::DepositsPaused { by }
        } else {
            VaultEvent::DepositsUnpaused { by }
        });
        Ok(())
    })
}

pub fn yield_rate(storage: &StorageRegion) -> Result<u16, VaultError> {
    Ok(storage.yield_rate_bps()?)
}

pub fn is_deposits_paused(storage: &StorageRegion) -> Result<bool, VaultError> {
    Ok(storage.deposits_paused()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
