//! # Access Control
//!
//! Role → set of principals. Roles are identified on-chain by a 32-byte id:
//! ADMIN is all zeros, every other role is the BLAKE3 of its name under a
//! fixed domain. Any number of principals may hold a role at once.
//!
//! Granting and revoking require ADMIN. The only exception is the initial
//! grant performed by `setupV1`, which goes through [`grant_unchecked`].

use serde::{Deserialize, Serialize};
use std::fmt;
use vaultline_protocol::hash::{domain_separated_hash, DOMAIN_ROLE_ID};
use vaultline_protocol::{Address, StorageRegion};

use crate::env::Env;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::state::VaultStorage;

/// The roles the vault knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Manages roles and protocol parameters.
    Admin,
    /// May swap the active implementation.
    Upgrader,
    /// May pause and unpause deposits. Meaningful from V2.
    Pauser,
}

impl Role {
    /// The on-chain name the id is derived from.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN_ROLE",
            Role::Upgrader => "UPGRADER_ROLE",
            Role::Pauser => "PAUSER_ROLE",
        }
    }

    /// The 32-byte role id used as the outer mapping key.
    pub fn id(&self) -> [u8; 32] {
        match self {
            Role::Admin => [0u8; 32],
            other => domain_separated_hash(DOMAIN_ROLE_ID, other.name().as_bytes()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `account` holds `role`.
pub fn has_role(storage: &StorageRegion, role: Role, account: &Address) -> Result<bool, VaultError> {
    Ok(storage.has_role_entry(&role.id(), account)?)
}

/// Fails with `Unauthorized` unless the caller holds `role`.
pub fn require_role(env: &Env<'_>, role: Role) -> Result<(), VaultError> {
    let caller = env.msg.caller;
    if has_role(env.storage, role, &caller)? {
        Ok(())
    } else {
        Err(VaultError::Unauthorized {
            role,
            account: caller,
        })
    }
}

/// Grants without an ADMIN check. Emits only if the role was not held.
pub fn grant_unchecked(env: &mut Env<'_>, role: Role, account: &Address) -> Result<(), VaultError> {
    if has_role(env.storage, role, account)? {
        return Ok(());
    }
    env.storage.set_role_entry(&role.id(), account, true)?;
    tracing::info!(role = %role, account = %account, sender = %env.msg.caller, "role granted");
    env.emit(VaultEvent::RoleGranted {
        role,
        account: *account,
        sender: env.msg.caller,
    });
    Ok(())
}

fn revoke_unchecked(env: &mut Env<'_>, role: Role, account: &Address) -> Result<(), VaultError> {
    if !has_role(env.storage, role, account)? {
        return Ok(());
    }
    env.storage.set_role_entry(&role.id(), account, false)?;
    tracing::info!(role = %role, account = %account, sender = %env.msg.caller, "role revoked");
    env.emit(VaultEvent::RoleRevoked {
        role,
        account: *account,
        sender: env.msg.caller,
    });
    Ok(())
}

/// `grantRole`: ADMIN only.
pub fn grant(env: &mut Env<'_>, role: Role, account: &Address) -> Result<(), VaultError> {
    require_role(env, Role::Admin)?;
    if account.is_zero() {
        return Err(VaultError::ZeroAddress { parameter: "account" });
    }
    grant_unchecked(env, role, account)
}

/// `revokeRole`: ADMIN only.
pub fn revoke(env: &mut Env<'_>, role: Role, account: &Address) -> Result<(), VaultError> {
    require_role(env, Role::Admin)?;
    revoke_unchecked(env, role, account)
}

/// `renounceRole`: the caller drops its own role.
pub fn renounce(env: &mut Env<'_>, role: Role) -> Result<(), VaultError> {
    let caller = env.msg.caller;
    revoke_unchecked(env, role, &caller)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
