//! # Reentrancy Guard
//!
//! One exclusive lock per instance, stored in slot 1. Every state-mutating
//! business operation runs inside [`nonreentrant`]; a second acquisition
//! while the first is held fails immediately with `ReentrantCall`. The lock
//! never blocks and never queues.
//!
//! A zero word counts as "not entered", so instances that predate
//! [`init`] behave.

use vaultline_protocol::config::{LOCK_ENTERED, LOCK_NOT_ENTERED};
use vaultline_protocol::StorageRegion;

use crate::env::Env;
use crate::error::VaultError;
use crate::state::VaultStorage;

/// Writes the resting value. Run by every setup step.
///
/// Fails with `ReentrantCall` while a guarded operation is in progress:
/// a setup step reached from a token callback must not release a lock it
/// does not own.
pub fn init(storage: &mut StorageRegion) -> Result<(), VaultError> {
    if is_entered(storage)? {
        tracing::warn!("setup attempted while the lock is held");
        return Err(VaultError::ReentrantCall);
    }
    storage.set_reentrancy_status(LOCK_NOT_ENTERED)?;
    Ok(())
}

/// Whether a guarded operation is in progress.
pub fn is_entered(storage: &StorageRegion) -> Result<bool, VaultError> {
    Ok(storage.reentrancy_status()? == LOCK_ENTERED)
}

fn enter(storage: &mut StorageRegion) -> Result<(), VaultError> {
    if is_entered(storage)? {
        tracing::warn!("reentrant call rejected");
        return Err(VaultError::ReentrantCall);
    }
    storage.set_reentrancy_status(LOCK_ENTERED)?;
    Ok(())
}

/// Runs `op` holding the lock. The lock is released whether `op` succeeds
/// or fails.
pub fn nonreentrant<T>(
    env: &mut Env<'_>,
    op: impl FnOnce(&mut Env<'_>) -> Result<T, VaultError>,
) -> Result<T, VaultError> {
    enter(env.storage)?;
    let result = op(env);
    env.storage.set_reentrancy_status(LOCK_NOT_ENTERED)?;
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::Harness;
    use vaultline_protocol::Address;

    #[test]
    fn lock_is_released_after_success_and_failure() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");

        h.with_env(alice, |env| nonreentrant(env, |_| Ok(())))
            .unwrap();
        assert!(!is_entered(&h.storage).unwrap());

        let err = h
            .with_env(alice, |env| {
                nonreentrant(env, |_| -> Result<(), VaultError> { Err(VaultError::ZeroAmount) })
            })
            .unwrap_err();
        assert_eq!(err, VaultError::ZeroAmount);
        assert!(!is_entered(&h.storage).unwrap());
    }

    #[test]
    fn nested_acquisition_fails() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let inner = h
            .with_env(alice, |env| nonreentrant(env, |env| Ok(nonreentrant(env, |_| Ok(())))))
            .unwrap();
        assert_eq!(inner, Err(VaultError::ReentrantCall));
    }

    #[test]
    fn init_refuses_to_release_a_held_lock() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let inner = h
            .with_env(alice, |env| nonreentrant(env, |env| Ok(init(env.storage))))
            .unwrap();
        assert_eq!(inner, Err(VaultError::ReentrantCall));
        assert!(!is_entered(&h.storage).unwrap());
    }

    #[test]
    fn zero_word_means_not_entered() {
        let mut storage = StorageRegion::new();
        assert!(!is_entered(&storage).unwrap());
        init(&mut storage).unwrap();
        assert!(!is_entered(&storage).unwrap());
    }
}
