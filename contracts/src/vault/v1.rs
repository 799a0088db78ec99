//! # VaultCore (V1)
//!
//! Setup, roles, deposits and withdrawals. Every later version routes its
//! ledger movements through the helpers here, so the fee math and the
//! `total_credited == Σ balances` bookkeeping live in exactly one place.
//!
//! ## Deposit
//!
//! `fee = floor(amount * fee_bps / 10000)`, `net = amount - fee`. The full
//! `amount` is pulled from the caller; only `net` is credited. The fee stays
//! in the vault as unallocated reserves.
//!
//! ## Withdraw
//!
//! Debit first, then transfer. If the token calls back in between, the
//! balance is already gone and the lock is held.

use vaultline_protocol::config::{BPS_DENOMINATOR, MAX_BPS};
use vaultline_protocol::{Address, StorageRegion};

use crate::access::{self, Role};
use crate::call::{Call, Output, VaultParams};
use crate::env::Env;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::guard::{self, nonreentrant};
use crate::initializer;
use crate::state::VaultStorage;
use crate::token;

/// The split of one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub gross: u64,
    pub fee: u64,
    pub net: u64,
}

pub(crate) fn route(env: &mut Env<'_>, call: &Call) -> Option<Result<Output, VaultError>> {
    let result = match call {
        Call::SetupV1(params) => setup(env, params).map(|()| Output::Unit),
        Call::InitializedVersion => initializer::initialized_version(env.storage).map(Output::Schema),

        Call::GrantRole { role, account } => access::grant(env, *role, account).map(|()| Output::Unit),
        Call::RevokeRole { role, account } => access::revoke(env, *role, account).map(|()| Output::Unit),
        Call::RenounceRole { role } => access::renounce(env, *role).map(|()| Output::Unit),
        Call::HasRole { role, account } => access::has_role(env.storage, *role, account).map(Output::Bool),

        Call::Deposit { amount } => deposit(env, *amount).map(|receipt| Output::Amount(receipt.net)),
        Call::Withdraw { amount } => withdraw(env, *amount).map(|()| Output::Unit),
        Call::BalanceOf { account } => balance_of(env.storage, account).map(Output::Amount),
        Call::TotalDeposits => total_deposits(env.storage).map(Output::Amount),
        Call::DepositFee => deposit_fee(env.storage).map(Output::Bps),
        _ => return None,
    };
    Some(result)
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// `setupV1(token, admin, fee)`: binds the instance and hands the admin
/// ADMIN and UPGRADER.
pub fn setup(env: &mut Env<'_>, params: &VaultParams) -> Result<(), VaultError> {
    if params.token.is_zero() {
        return Err(VaultError::ZeroAddress { parameter: "token" });
    }
    if params.admin.is_zero() {
        return Err(VaultError::ZeroAddress { parameter: "admin" });
    }
    if params.deposit_fee_bps > MAX_BPS {
        return Err(VaultError::BpsOutOfRange {
            parameter: "deposit_fee_bps",
            value: params.deposit_fee_bps,
        });
    }

    initializer::advance(env.storage, 1)?;
    guard::init(env.storage)?;
    env.storage.set_token(&params.token)?;
    env.storage.set_deposit_fee_bps(params.deposit_fee_bps)?;
    access::grant_unchecked(env, Role::Admin, &params.admin)?;
    access::grant_unchecked(env, Role::Upgrader, &params.admin)?;

    tracing::info!(
        vault = %env.msg.vault,
        token = %params.token,
        admin = %params.admin,
        fee_bps = params.deposit_fee_bps,
        "vault initialized at V1"
    );
    env.emit(VaultEvent::Initialized { version: 1 });
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger helpers
// ---------------------------------------------------------------------------

/// Splits `amount` into `(fee, net)` at `fee_bps`, rounding the fee down.
pub fn split_fee(amount: u64, fee_bps: u16) -> Result<(u64, u64), VaultError> {
    let fee = u128::from(amount) * u128::from(fee_bps) / u128::from(BPS_DENOMINATOR);
    let fee = u64::try_from(fee).map_err(|_| VaultError::ArithmeticOverflow)?;
    let net = amount.checked_sub(fee).ok_or(VaultError::ArithmeticOverflow)?;
    Ok((fee, net))
}

/// Adds `amount` to `account`'s balance and to the total.
pub(crate) fn credit(env: &mut Env<'_>, account: &Address, amount: u64) -> Result<(), VaultError> {
    let balance = env
        .storage
        .balance(account)?
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow)?;
    let total = env
        .storage
        .total_credited()?
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow)?;
    env.storage.set_balance(account, balance)?;
    env.storage.set_total_credited(total)?;
    Ok(())
}

/// Removes `amount` from `account`'s balance and from the total.
pub(crate) fn debit(env: &mut Env<'_>, account: &Address, amount: u64) -> Result<(), VaultError> {
    let available = env.storage.balance(account)?;
    if available < amount {
        return Err(VaultError::InsufficientBalance {
            available,
            requested: amount,
        });
    }
    let total = env
        .storage
        .total_credited()?
        .checked_sub(amount)
        .ok_or(VaultError::ArithmeticOverflow)?;
    env.storage.set_balance(account, available - amount)?;
    env.storage.set_total_credited(total)?;
    Ok(())
}

/// Deposit body shared by every version. The caller holds the lock.
pub(crate) fn credit_deposit(env: &mut Env<'_>, amount: u64) -> Result<DepositReceipt, VaultError> {
    initializer::require_schema(env.storage, 1)?;
    if amount == 0 {
        return Err(VaultError::ZeroAmount);
    }
    let (fee, net) = split_fee(amount, env.storage.deposit_fee_bps()?)?;
    let user = env.msg.caller;

    token::pull(env, &user, amount)?;
    credit(env, &user, net)?;

    tracing::debug!(user = %user, gross = amount, fee, net, "deposit credited");
    env.emit(VaultEvent::Deposited {
        user,
        gross: amount,
        fee,
        net,
    });
    Ok(DepositReceipt {
        gross: amount,
        fee,
        net,
    })
}

/// Pays `amount` out to `user` after debiting it. The caller holds the lock.
pub(crate) fn pay_out(env: &mut Env<'_>, user: &Address, amount: u64) -> Result<(), VaultError> {
    debit(env, user, amount)?;
    token::push(env, user, amount)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// `deposit(amount)`.
pub fn deposit(env: &mut Env<'_>, amount: u64) -> Result<DepositReceipt, VaultError> {
    nonreentrant(env, |env| credit_deposit(env, amount))
}

/// `withdraw(amount)`.
pub fn withdraw(env: &mut Env<'_>, amount: u64) -> Result<(), VaultError> {
    nonreentrant(env, |env| {
        initializer::require_schema(env.storage, 1)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let user = env.msg.caller;
        pay_out(env, &user, amount)?;

        tracing::debug!(user = %user, amount, "withdrawal paid");
        env.emit(VaultEvent::Withdrawn { user, amount });
        Ok(())
    })
}

pub fn balance_of(storage: &StorageRegion, account: &Address) -> Result<u64, VaultError> {
    Ok(storage.balance(account)?)
}

pub fn total_deposits(storage: &StorageRegion) -> Result<u64, VaultError> {
    Ok(storage.total_credited()?)
}

pub fn deposit_fee(storage: &StorageRegion) -> Result<u16, VaultError> {
    Ok(storage.deposit_fee_bps()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::Harness;
    use crate::ErrorKind;

    fn setup_harness(fee_bps: u16) -> (Harness, Address) {
        let mut h = Harness::new();
        let admin = Address::derive("admin");
        let params = VaultParams {
            token: h.token.address(),
            admin,
            deposit_fee_bps: fee_bps,
        };
        h.execute(admin, &Call::SetupV1(params)).unwrap();
        (h, admin)
    }

    fn fund(h: &mut Harness, who: &Address, amount: u64) {
        h.token.mint(who, amount).unwrap();
        let vault = h.vault;
        h.token.approve(who, &vault, amount);
    }

    #[test]
    fn fee_rounds_down() {
        assert_eq!(split_fee(1_000, 50).unwrap(), (5, 995));
        assert_eq!(split_fee(199, 50).unwrap(), (0, 199));
        assert_eq!(split_fee(10_001, 1).unwrap(), (1, 10_000));
        assert_eq!(split_fee(777, 10_000).unwrap(), (777, 0));
        assert_eq!(split_fee(u64::MAX, 10_000).unwrap(), (u64::MAX, 0));
    }

    #[test]
    fn setup_binds_token_fee_and_roles() {
        let (h, admin) = setup_harness(250);
        assert_eq!(h.storage.token().unwrap(), h.token.address());
        assert_eq!(deposit_fee(&h.storage).unwrap(), 250);
        assert!(access::has_role(&h.storage, Role::Admin, &admin).unwrap());
        assert!(access::has_role(&h.storage, Role::Upgrader, &admin).unwrap());
        assert!(!access::has_role(&h.storage, Role::Pauser, &admin).unwrap());
        assert_eq!(h.events.last(), Some(&VaultEvent::Initialized { version: 1 }));
    }

    #[test]
    fn setup_validates_params() {
        let mut h = Harness::new();
        let admin = Address::derive("admin");
        let token = h.token.address();

        let err = h
            .execute(
                admin,
                &Call::SetupV1(VaultParams {
                    token,
                    admin,
                    deposit_fee_bps: 10_001,
                }),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

        let err = h
            .execute(
                admin,
                &Call::SetupV1(VaultParams {
                    token: Address::ZERO,
                    admin,
                    deposit_fee_bps: 0,
                }),
            )
            .unwrap_err();
        assert_eq!(err, VaultError::ZeroAddress { parameter: "token" });
        assert!(h.storage.is_empty());
    }

    #[test]
    fn deposit_credits_net_and_keeps_fee() {
        let (mut h, _) = setup_harness(100);
        let alice = Address::derive("alice");
        fund(&mut h, &alice, 10_000);

        h.execute(alice, &Call::Deposit { amount: 10_000 }).unwrap();
        assert_eq!(balance_of(&h.storage, &alice).unwrap(), 9_900);
        assert_eq!(total_deposits(&h.storage).unwrap(), 9_900);
        assert_eq!(h.token.balance_of(&h.vault), 10_000);
        assert_eq!(
            h.events.last(),
            Some(&VaultEvent::Deposited {
                user: alice,
                gross: 10_000,
                fee: 100,
                net: 9_900
            })
        );
    }

    #[test]
    fn full_fee_credits_nothing() {
        let (mut h, _) = setup_harness(10_000);
        let alice = Address::derive("alice");
        fund(&mut h, &alice, 500);
        h.execute(alice, &Call::Deposit { amount: 500 }).unwrap();
        assert_eq!(balance_of(&h.storage, &alice).unwrap(), 0);
        assert_eq!(h.token.balance_of(&h.vault), 500);
    }

    #[test]
    fn zero_deposit_rejected() {
        let (mut h, _) = setup_harness(0);
        let alice = Address::derive("alice");
        assert_eq!(
            h.execute(alice, &Call::Deposit { amount: 0 }),
            Err(VaultError::ZeroAmount)
        );
    }

    #[test]
    fn deposit_before_setup_rejected() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        fund(&mut h, &alice, 10);
        assert_eq!(
            h.execute(alice, &Call::Deposit { amount: 10 }),
            Err(VaultError::NotInitialized {
                required: 1,
                current: 0
            })
        );
    }

    #[test]
    fn withdraw_debits_then_pays() {
        let (mut h, _) = setup_harness(0);
        let alice = Address::derive("alice");
        fund(&mut h, &alice, 1_000);
        h.execute(alice, &Call::Deposit { amount: 1_000 }).unwrap();

        h.execute(alice, &Call::Withdraw { amount: 300 }).unwrap();
        assert_eq!(balance_of(&h.storage, &alice).unwrap(), 700);
        assert_eq!(total_deposits(&h.storage).unwrap(), 700);
        assert_eq!(h.token.balance_of(&alice), 300);
        assert_eq!(h.token.balance_of(&h.vault), 700);
    }

    #[test]
    fn overdraw_rejected_without_side_effects() {
        let (mut h, _) = setup_harness(0);
        let alice = Address::derive("alice");
        fund(&mut h, &alice, 100);
        h.execute(alice, &Call::Deposit { amount: 100 }).unwrap();
        let before = h.storage.clone();

        assert_eq!(
            h.execute(alice, &Call::Withdraw { amount: 101 }),
            Err(VaultError::InsufficientBalance {
                available: 100,
                requested: 101
            })
        );
        assert_eq!(h.storage, before);
        assert!(!guard::is_entered(&h.storage).unwrap());
    }

    #[test]
    fn reads_default_to_zero() {
        let (h, _) = setup_harness(0);
        assert_eq!(balance_of(&h.storage, &Address::derive("nobody")).unwrap(), 0);
    }
}
