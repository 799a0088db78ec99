//! Implementation versions and call dispatch.
//!
//! Dispatch walks the layers top-down: the newest layer the active version
//! includes gets the first look at a call, then the one below it. A call
//! nobody claims is unsupported, unless it is a setup step from the future,
//! in which case the instance has simply not been upgraded yet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{v1, v2, v3};
use crate::call::{Call, Output};
use crate::env::Env;
use crate::error::VaultError;
use crate::layout::{StorageLayout, LAYOUT_V1, LAYOUT_V2, LAYOUT_V3};

/// A released version of the vault code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ImplementationVersion {
    V1,
    V2,
    V3,
}

impl ImplementationVersion {
    /// Every released version, oldest first.
    pub const ALL: [ImplementationVersion; 3] = [Self::V1, Self::V2, Self::V3];

    /// The schema version this code's setup advances to.
    pub fn schema(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    pub fn from_schema(schema: u8) -> Option<Self> {
        match schema {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// The storage layout this code reads and writes.
    pub fn layout(self) -> &'static StorageLayout {
        match self {
            Self::V1 => &LAYOUT_V1,
            Self::V2 => &LAYOUT_V2,
            Self::V3 => &LAYOUT_V3,
        }
    }

    /// A fresh logic object for this version.
    pub fn logic(self) -> Arc<dyn VaultLogic> {
        match self {
            Self::V1 => Arc::new(VaultV1),
            Self::V2 => Arc::new(VaultV2),
            Self::V3 => Arc::new(VaultV3),
        }
    }
}

impl fmt::Display for ImplementationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.schema())
    }
}

/// Code a proxy can point at.
pub trait VaultLogic: Send + Sync + fmt::Debug {
    fn version(&self) -> ImplementationVersion;

    fn layout(&self) -> &'static StorageLayout {
        self.version().layout()
    }

    /// Executes one call. Not atomic on its own; see
    /// [`crate::env::execute_atomic`].
    fn execute(&self, env: &mut Env<'_>, call: &Call) -> Result<Output, VaultError>;
}

/// Deposits, withdrawals, fees, roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultV1;

/// V1 plus yield and pausable deposits.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultV2;

/// V2 plus delayed and emergency withdrawals.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultV3;

impl VaultLogic for VaultV1 {
    fn version(&self) -> ImplementationVersion {
        ImplementationVersion::V1
    }

    fn execute(&self, env: &mut Env<'_>, call: &Call) -> Result<Output, VaultError> {
        dispatch(self.version(), env, call)
    }
}

impl VaultLogic for VaultV2 {
    fn version(&self) -> ImplementationVersion {
        ImplementationVersion::V2
    }

    fn execute(&self, env: &mut Env<'_>, call: &Call) -> Result<Output, VaultError> {
        dispatch(self.version(), env, call)
    }
}

impl VaultLogic for VaultV3 {
    fn version(&self) -> ImplementationVersion {
        ImplementationVersion::V3
    }

    fn execute(&self, env: &mut Env<'_>, call: &Call) -> Result<Output, VaultError> {
        dispatch(self.version(), env, call)
    }
}

fn dispatch(
    version: ImplementationVersion,
    env: &mut Env<'_>,
    call: &Call,
) -> Result<Output, VaultError> {
    if let Call::ImplementationVersion = call {
        return Ok(Output::Version(version));
    }
    if version >= ImplementationVersion::V3 {
        if let Some(result) = v3::route(env, call) {
            return result;
        }
    }
    if version >= ImplementationVersion::V2 {
        if let Some(result) = v2::route(env, call) {
            return result;
        }
    }
    if let Some(result) = v1::route(env, call) {
        return result;
    }

    Err(match call.setup_target() {
        Some(requested) => VaultError::NotYetUpgraded {
            requested,
            implementation: version,
        },
        None => VaultError::UnsupportedCall {
            call: call.name(),
            implementation: version,
        },
    })
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
    fn versions_render_and_order() {
        assert_eq!(ImplementationVersion::V2.to_string(), "V2");
        assert!(ImplementationVersion::V1 < ImplementationVersion::V3);
        assert_eq!(ImplementationVersion::from_schema(3), Some(ImplementationVersion::V3));
        assert_eq!(ImplementationVersion::from_schema(255), None);
    }

    #[test]
    fn layouts_match_versions() {
        for version in ImplementationVersion::ALL {
            assert_eq!(version.logic().layout().schema, version.schema());
            assert_eq!(version.logic().version(), version);
        }
    }

    #[test]
    fn older_code_refuses_newer_calls() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let logic = VaultV1;
        let err = h
            .with_env(alice, |env| logic.execute(env, &Call::ClaimYield))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::UnsupportedCall {
                call: "claimYield",
                implementation: ImplementationVersion::V1
            }
        );

        let err = h
            .with_env(alice, |env| logic.execute(env, &Call::SetupV2))
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::NotYetUpgraded {
                requested: 2,
                implementation: ImplementationVersion::V1
            }
        );

        let err = h
            .with_env(alice, |env| VaultV2.execute(env, &Call::SetupV3))
            .unwrap_err();
        assert!(matches!(err, VaultError::NotYetUpgraded { requested: 3, .. }));
    }

    #[test]
    fn implementation_version_reports_active_code() {
        let mut h = Harness::new();
        let alice = Address::derive("alice");
        let out = h
            .with_env(alice, |env| VaultV2.execute(env, &Call::ImplementationVersion))
            .unwrap();
        assert_eq!(out, Output::Version(ImplementationVersion::V2));
    }
}
