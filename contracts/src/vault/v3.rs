//! # DelayedWithdrawalEngine (V3)
//!
//! Two-phase withdrawals: ask now, collect after the delay. One outstanding
//! request per account; a new request replaces the old one. The request is
//! only a reservation of intent, so the balance is checked again when it
//! executes, and the whole execution fails if the balance has shrunk below
//! the requested amount in the meantime.
//!
//! `emergencyWithdraw` skips the queue and takes the whole balance,
//! dropping any outstanding request.
//!
//! A delay of zero (never configured) makes requests executable in the
//! same block they were made.

use vaultline_protocol::config::{MAX_WITHDRAWAL_DELAY_SECS, MIN_WITHDRAWAL_DELAY_SECS};
use vaultline_protocol::{Address, StorageRegion};

use super::v1;
use crate::access::{self, Role};
use crate::call::{Call, Output, WithdrawalRequest};
use crate::env::Env;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::guard::{self, nonreentrant};
use crate::initializer;
use crate::state::VaultStorage;

pub(crate) fn route(env: &mut Env<'_>, call: &Call) -> Option<Result<Output, VaultError>> {
    let result = match call {
        Call::SetupV3 => setup(env).map(|()| Output::Unit),
        Call::SetWithdrawalDelay { seconds } => {
            set_withdrawal_delay(env, *seconds).map(|()| Output::Unit)
        }
        Call::WithdrawalDelay => withdrawal_delay(env.storage).map(Output::Seconds),
        Call::RequestWithdrawal { amount } => request_withdrawal(env, *amount).map(|()| Output::Unit),
        Call::ExecuteWithdrawal => execute_withdrawal(env).map(Output::Amount),
        Call::EmergencyWithdraw => emergency_withdraw(env).map(Output::Amount),
        Call::GetWithdrawalRequest { account } => {
            withdrawal_request(env.storage, account).map(Output::Request)
        }
        _ => return None,
    };
    Some(result)
}

/// `setupV3()`: advances the gate. Adds no field defaults.
pub fn setup(env: &mut Env<'_>) -> Result<(), VaultError> {
    initializer::advance(env.storage, 3)?;
    guard::init(env.storage)?;
    tracing::info!(vault = %env.msg.vault, "vault initialized at V3");
    env.emit(VaultEvent::Initialized { version: 3 });
    Ok(())
}

/// `setWithdrawalDelay(seconds)`: ADMIN only, `[1 hour, 30 days]`.
pub fn set_withdrawal_delay(env: &mut Env<'_>, seconds: u64) -> Result<(), VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 3)?;
        access::require_role(env, Role::Admin)?;
        if !(MIN_WITHDRAWAL_DELAY_SECS..=MAX_WITHDRAWAL_DELAY_SECS).contains(&seconds) {
            return Err(VaultError::DelayOutOfRange {
                seconds,
                min: MIN_WITHDRAWAL_DELAY_SECS,
                max: MAX_WITHDRAWAL_DELAY_SECS,
            });
        }
        env.storage.set_withdrawal_delay_secs(seconds)?;
        tracing::info!(seconds, "withdrawal delay updated");
        env.emit(VaultEvent::WithdrawalDelayUpdated { seconds });
        Ok(())
    })
}

/// `requestWithdrawal(amount)`: replaces any outstanding request.
pub fn request_withdrawal(env: &mut Env<'_>, amount: u64) -> Result<(), VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 3)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let user = env.msg.caller;
        let available = env.storage.balance(&user)?;
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        let at = env.msg.now;
        env.storage.set_pending_withdrawal(
            &user,
            &WithdrawalRequest {
                amount,
                requested_at: at,
            },
        )?;
        tracing::debug!(user = %user, amount, at, "withdrawal requested");
        env.emit(VaultEvent::WithdrawalRequested { user, amount, at });
        Ok(())
    })
}

/// `executeWithdrawal()`. Returns the amount paid.
pub fn execute_withdrawal(env: &mut Env<'_>) -> Result<u64, VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 3)?;
        let user = env.msg.caller;
        let request = env.storage.pending_withdrawal(&user)?;
        if !request.is_pending() {
            return Err(VaultError::NoPendingWithdrawal);
        }

        let ready_at = request
            .requested_at
            .checked_add(env.storage.withdrawal_delay_secs()?)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let now = env.msg.now;
        if now < ready_at {
            return Err(VaultError::DelayNotElapsed { ready_at, now });
        }

        env.storage
            .set_pending_withdrawal(&user, &WithdrawalRequest::default())?;
        v1::pay_out(env, &user, request.amount)?;

        tracing::debug!(user = %user, amount = request.amount, "delayed withdrawal paid");
        env.emit(VaultEvent::WithdrawalExecuted {
            user,
            amount: request.amount,
        });
        Ok(request.amount)
    })
}

/// `emergencyWithdraw()`: the whole balance, now. Returns the amount paid.
///
/// Always clears the caller's request. With an empty balance and a stale
/// request left over, it clears the request and pays nothing; with neither
/// it fails with `ZeroAmount`.
pub fn emergency_withdraw(env: &mut Env<'_>) -> Result<u64, VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 3)?;
        let user = env.msg.caller;
        let amount = env.storage.balance(&user)?;
        let stale = env.storage.pending_withdrawal(&user)?.is_pending();
        if amount == 0 && !stale {
            return Err(VaultError::ZeroAmount);
        }

        env.storage
            .set_pending_withdrawal(&user, &WithdrawalRequest::default())?;
        if amount > 0 {
            v1::pay_out(env, &user, amount)?;
        }

        tracing::warn!(user = %user, amount, "emergency withdrawal");
        env.emit(VaultEvent::EmergencyWithdrawn { user, amount });
        Ok(amount)
    })
}

pub fn withdrawal_delay(storage: &StorageRegion) -> Result<u64, VaultError> {
    Ok(storage.withdrawal_delay_secs()?)
}

pub fn withdrawal_request(storage: &StorageRegion, account: &Address) -> Result<WithdrawalRequest, VaultError> {
    Ok(storage.pending_withdrawal(account)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
