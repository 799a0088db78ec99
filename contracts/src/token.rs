//! # External Token
//!
//! The vault never owns money; it owns a balance on somebody else's ledger.
//! [`Token`] is that ledger as the vault sees it, and the two helpers here
//! are the only way vault code moves value:
//!
//! - [`pull`]: `transferFrom(caller → vault)`, then checks the vault's
//!   balance grew by exactly the amount.
//! - [`push`]: `transfer(vault → recipient)`, then checks the vault's
//!   balance fell by exactly the amount.
//!
//! A token that errors, returns `false`, or moves a different amount all
//! end the same way: `ExternalTransferFailure`, and the call rolls back.
//!
//! ## Callbacks
//!
//! Transfers receive a [`Reentry`] handle. An honest token ignores it. A
//! hostile one can use it to call back into the vault mid-transfer, which
//! is exactly what the reentrancy guard is there to refuse.

use thiserror::Error;
use vaultline_protocol::{Address, FungibleLedger, LedgerError};

use crate::env::{Env, Reentry};
use crate::error::VaultError;
use crate::state::VaultStorage;

/// Why a token call failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenFault {
    /// The ledger refused the transfer.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Any other failure a token implementation wants to report.
    #[error("token reverted: {0}")]
    Reverted(String),
}

/// An external fungible token ledger.
pub trait Token {
    /// Address of the token contract.
    fn address(&self) -> Address;

    /// Balance of `holder`.
    fn balance_of(&self, holder: &Address) -> u64;

    /// `sender` moves `amount` of its own tokens to `to`.
    fn transfer(
        &mut self,
        reentry: &mut Reentry<'_>,
        sender: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<bool, TokenFault>;

    /// `spender` moves `amount` from `from` to `to` on its allowance.
    fn transfer_from(
        &mut self,
        reentry: &mut Reentry<'_>,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<bool, TokenFault>;
}

impl Token for FungibleLedger {
    fn address(&self) -> Address {
        FungibleLedger::address(self)
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        FungibleLedger::balance_of(self, holder)
    }

    fn transfer(
        &mut self,
        _reentry: &mut Reentry<'_>,
        sender: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<bool, TokenFault> {
        FungibleLedger::transfer(self, sender, to, amount)?;
        Ok(true)
    }

    fn transfer_from(
        &mut self,
        _reentry: &mut Reentry<'_>,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<bool, TokenFault> {
        FungibleLedger::transfer_from(self, spender, from, to, amount)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Checked transfers
// ---------------------------------------------------------------------------

fn ensure_bound_token(env: &Env<'_>) -> Result<(), VaultError> {
    let bound = env.storage.token()?;
    let provided = env.token.address();
    if bound != provided {
        return Err(VaultError::TokenMismatch { bound, provided });
    }
    Ok(())
}

/// Token balance the vault holds right now.
pub fn held_reserves(env: &Env<'_>) -> Result<u64, VaultError> {
    ensure_bound_token(env)?;
    Ok(env.token.balance_of(&env.msg.vault))
}

/// Pulls exactly `amount` from `from` into the vault.
pub fn pull(env: &mut Env<'_>, from: &Address, amount: u64) -> Result<(), VaultError> {
    ensure_bound_token(env)?;
    let vault = env.msg.vault;
    let before = env.token.balance_of(&vault);

    let returned = {
        let mut reentry = Reentry::new(env.msg, &mut *env.storage, env.logic, &mut *env.events);
        env.token
            .transfer_from(&mut reentry, &vault, from, &vault, amount)?
    };
    if !returned {
        return Err(VaultError::TransferReturnedFalse {
            operation: "transferFrom",
        });
    }

    let received = env.token.balance_of(&vault).saturating_sub(before);
    if received != amount {
        return Err(VaultError::TransferShortfall {
            expected: amount,
            actual: received,
        });
    }
    Ok(())
}

/// Pushes exactly `amount` from the vault to `to`.
pub fn push(env: &mut Env<'_>, to: &Address, amount: u64) -> Result<(), VaultError> {
    ensure_bound_token(env)?;
    let vault = env.msg.vault;
    let before = env.token.balance_of(&vault);

    let returned = {
        let mut reentry = Reentry::new(env.msg, &mut *env.storage, env.logic, &mut *env.events);
        env.token.transfer(&mut reentry, &vault, to, amount)?
    };
    if !returned {
        return Err(VaultError::TransferReturnedFalse {
            operation: "transfer",
        });
    }

    let sent = before.saturating_sub(env.token.balance_of(&vault));
    if sent != amount {
        return Err(VaultError::TransferShortfall {
            expected: amount,
            actual: sent,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
