//! # Fungible Token Ledger
//!
//! The external token a vault holds its custody in. From the vault's point
//! of view this is somebody else's contract: it moves balances between
//! addresses, enforces allowances, and may refuse. The vault only ever sees
//! `transfer`, `transfer_from` and `balance_of`.
//!
//! ## Security Model
//!
//! - **Allowances**: `transfer_from` spends the spender's allowance over the
//!   owner's balance, and fails without touching anything if either is short.
//! - **Supply tracking**: total supply and per-address balances move
//!   together. Overflow is checked on every operation.
//! - **All-or-nothing**: every failing operation leaves the ledger exactly
//!   as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::address::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The sender does not hold enough tokens.
    #[error("insufficient balance: {holder} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Its current balance.
        balance: u64,
        /// Amount requested.
        amount: u64,
    },

    /// The spender's allowance over the owner's tokens is too small.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}'s tokens, needs {amount}")]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Spender acting on the owner's behalf.
        spender: Address,
        /// Remaining allowance.
        allowance: u64,
        /// Amount requested.
        amount: u64,
    },

    /// A credit would overflow `u64`.
    #[error("supply overflow: crediting {amount} would exceed u64::MAX")]
    Overflow {
        /// The amount that was attempted.
        amount: u64,
    },

    /// Transfers to the zero address are rejected; use `burn`.
    #[error("transfer to the zero address")]
    ZeroRecipient,
}

// ---------------------------------------------------------------------------
// FungibleLedger
// ---------------------------------------------------------------------------

/// An in-memory fungible token with balances and allowances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleLedger {
    /// Address the token contract lives at.
    address: Address,
    /// Ticker symbol, display only.
    symbol: String,
    /// Decimal places, display only. The ledger never divides.
    decimals: u8,
    /// Sum of all balances.
    total_supply: u64,
    /// Per-holder balances. Zero entries are removed.
    balances: BTreeMap<Address, u64>,
    /// `owner -> spender -> remaining allowance`.
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
}

impl FungibleLedger {
    /// Creates a token with zero supply.
    pub fn new(address: Address, symbol: &str, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            decimals,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    /// Address of the token contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Display decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Total supply in smallest units.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Balance of `holder`, zero if never seen.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Remaining allowance of `spender` over `owner`'s tokens.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Creates `amount` new tokens in `to`'s balance.
    pub fn mint(&mut self, to: &Address, amount: u64) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroRecipient);
        }
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;

        self.total_supply = new_supply;
        self.set_balance(to, new_balance);
        Ok(())
    }

    /// Destroys `amount` tokens from `from`'s balance.
    pub fn burn(&mut self, from: &Address, amount: u64) -> Result<(), LedgerError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *from,
                balance,
                amount,
            });
        }
        self.set_balance(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s tokens, replacing any
    /// previous value.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) {
        let entry = self.allowances.entry(*owner).or_default();
        if amount == 0 {
            entry.remove(spender);
        } else {
            entry.insert(*spender, amount);
        }
    }

    /// Moves `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroRecipient);
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *from,
                balance: from_balance,
                amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: *from,
                spender: *spender,
                allowance,
                amount,
            });
        }
        self.transfer(from, to, amount)?;
        self.approve(from, spender, allowance - amount);
        Ok(())
    }

    fn set_balance(&mut self, holder: &Address, amount: u64) {
        if amount == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(*holder, amount);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> FungibleLedger {
        FungibleLedger::new(Address::derive("usdv"), "USDV", 6)
    }

    #[test]
    fn mint_increases_balance_and_supply() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        token.mint(&alice, 1_000).unwrap();
        assert_eq!(token.balance_of(&alice), 1_000);
        assert_eq!(token.total_supply(), 1_000);
    }

    #[test]
    fn transfer_moves_balance() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        token.mint(&alice, 1_000).unwrap();
        token.transfer(&alice, &bob, 400).unwrap();
        assert_eq!(token.balance_of(&alice), 600);
        assert_eq!(token.balance_of(&bob), 400);
        assert_eq!(token.total_supply(), 1_000);
    }

    #[test]
    fn transfer_insufficient_balance_leaves_state() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        token.mint(&alice, 100).unwrap();
        let before = token.clone();

        let err = token.transfer(&alice, &bob, 101).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                balance: 100,
                amount: 101,
                ..
            }
        ));
        assert_eq!(token, before);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        let vault = Address::derive("vault");
        token.mint(&alice, 1_000).unwrap();
        token.approve(&alice, &vault, 700);

        token.transfer_from(&vault, &alice, &vault, 500).unwrap();
        assert_eq!(token.balance_of(&vault), 500);
        assert_eq!(token.allowance(&alice, &vault), 200);
    }

    #[test]
    fn transfer_from_without_allowance_rejected() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        let vault = Address::derive("vault");
        token.mint(&alice, 1_000).unwrap();
        token.approve(&alice, &vault, 10);

        let err = token.transfer_from(&vault, &alice, &vault, 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { allowance: 10, .. }));
        assert_eq!(token.balance_of(&alice), 1_000);
        assert_eq!(token.allowance(&alice, &vault), 10);
    }

    #[test]
    fn transfer_to_zero_rejected() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        token.mint(&alice, 5).unwrap();
        assert_eq!(
            token.transfer(&alice, &Address::ZERO, 1),
            Err(LedgerError::ZeroRecipient)
        );
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        token.mint(&alice, u64::MAX).unwrap();
        assert!(matches!(
            token.mint(&alice, 1),
            Err(LedgerError::Overflow { amount: 1 })
        ));
    }

    #[test]
    fn burn_reduces_supply() {
        let mut token = ledger();
        let alice = Address::derive("alice");
        token.mint(&alice, 50).unwrap();
        token.burn(&alice, 20).unwrap();
        assert_eq!(token.balance_of(&alice), 30);
        assert_eq!(token.total_supply(), 30);
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut token = ledger();
        token.mint(&Address::derive("alice"), 42).unwrap();
        let json = serde_json::to_string(&token).expect("serialize");
        let recovered: FungibleLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered, token);
    }
}
