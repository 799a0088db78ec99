//! # Versioned Initializer
//!
//! A monotonic one-shot gate. The instance remembers the highest setup step
//! it has run; step `n` may run only when that number is exactly `n - 1`.
//!
//! ```text
//! Uninitialized ──setupV1──► AtVersion(1) ──setupV2──► AtVersion(2) ──setupV3──► AtVersion(3)
//!
//! Template (sentinel 255): every setup fails, forever.
//! ```
//!
//! Logic templates are stamped with the sentinel when deployed, before any
//! proxy points at them, so nobody can take one over by calling its setup.

use vaultline_protocol::config::TEMPLATE_SENTINEL_VERSION;
use vaultline_protocol::StorageRegion;

use crate::error::VaultError;
use crate::state::VaultStorage;

/// The initializer's view of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    AtVersion(u8),
    Template,
}

impl InitState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => InitState::Uninitialized,
            TEMPLATE_SENTINEL_VERSION => InitState::Template,
            n => InitState::AtVersion(n),
        }
    }
}

/// The raw initialized version: 0, 1..=3, or the sentinel.
pub fn initialized_version(storage: &StorageRegion) -> Result<u8, VaultError> {
    Ok(storage.initialized_version()?)
}

pub fn state(storage: &StorageRegion) -> Result<InitState, VaultError> {
    initialized_version(storage).map(InitState::from_raw)
}

/// Stamps a template's storage with the sentinel.
pub fn lock_template(storage: &mut StorageRegion) -> Result<(), VaultError> {
    storage.set_initialized_version(TEMPLATE_SENTINEL_VERSION)?;
    Ok(())
}

/// Advances the gate to `target`, or explains why it cannot.
pub fn advance(storage: &mut StorageRegion, target: u8) -> Result<(), VaultError> {
    let current = initialized_version(storage)?;
    if current == TEMPLATE_SENTINEL_VERSION || current >= target {
        return Err(VaultError::AlreadyInitialized {
            current,
            requested: target,
        });
    }
    if current + 1 != target {
        return Err(VaultError::SetupOutOfOrder {
            current,
            requested: target,
        });
    }
    storage.set_initialized_version(target)?;
    tracing::info!(from = current, to = target, "initializer advanced");
    Ok(())
}

/// Fails unless the instance is live and at least at schema `required`.
/// Templates never qualify.
pub fn require_schema(storage: &StorageRegion, required: u8) -> Result<u8, VaultError> {
    let current = initialized_version(storage)?;
    match InitState::from_raw(current) {
        InitState::AtVersion(n) if n >= required => Ok(n),
        _ => Err(VaultError::NotInitialized { required, current }),
    }
}

/// The live schema, or 0 for uninitialized instances and templates.
pub fn live_schema(storage: &StorageRegion) -> Result<u8, VaultError> {
    Ok(match state(storage)? {
        InitState::AtVersion(n) => n,
        InitState::Uninitialized | InitState::Template => 0,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_in_order() {
        let mut storage = StorageRegion::new();
        assert_eq!(state(&storage).unwrap(), InitState::Uninitialized);
        for v in 1..=3 {
            advance(&mut storage, v).unwrap();
            assert_eq!(state(&storage).unwrap(), InitState::AtVersion(v));
        }
    }

    #[test]
    fn replay_is_rejected() {
        let mut storage = StorageRegion::new();
        advance(&mut storage, 1).unwrap();
        assert_eq!(
            advance(&mut storage, 1),
            Err(VaultError::AlreadyInitialized {
                current: 1,
                requested: 1
            })
        );
    }

    #[test]
    fn skipping_is_rejected() {
        let mut storage = StorageRegion::new();
        assert_eq!(
            advance(&mut storage, 2),
            Err(VaultError::SetupOutOfOrder {
                current: 0,
                requested: 2
            })
        );
        advance(&mut storage, 1).unwrap();
        assert_eq!(
            advance(&mut storage, 3),
            Err(VaultError::SetupOutOfOrder {
                current: 1,
                requested: 3
            })
        );
        assert_eq!(initialized_version(&storage).unwrap(), 1);
    }

    #[test]
    fn template_is_locked_forever() {
        let mut storage = StorageRegion::new();
        lock_template(&mut storage).unwrap();
        assert_eq!(state(&storage).unwrap(), InitState::Template);
        for v in 1..=3 {
            assert!(matches!(
                advance(&mut storage, v),
                Err(VaultError::AlreadyInitialized { current: 255, .. })
            ));
        }
        assert_eq!(live_schema(&storage).unwrap(), 0);
    }

    #[test]
    fn schema_requirements() {
        let mut storage = StorageRegion::new();
        assert_eq!(
            require_schema(&storage, 1),
            Err(VaultError::NotInitialized {
                required: 1,
                current: 0
            })
        );
        advance(&mut storage, 1).unwrap();
        assert_eq!(require_schema(&storage, 1), Ok(1));
        assert!(require_schema(&storage, 2).is_err());

        let mut template = StorageRegion::new();
        lock_template(&mut template).unwrap();
        assert!(require_schema(&template, 1).is_err());
    }
}
