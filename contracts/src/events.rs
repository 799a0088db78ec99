//! # Vault Events
//!
//! The observable log. Events are not state: nothing reads them back, and a
//! failed call leaves none behind.

use serde::{Deserialize, Serialize};
use vaultline_protocol::Address;

use crate::access::Role;

/// An event emitted by a vault instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum VaultEvent {
    Initialized {
        version: u8,
    },
    Upgraded {
        implementation: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    Deposited {
        user: Address,
        gross: u64,
        fee: u64,
        net: u64,
    },
    Withdrawn {
        user: Address,
        amount: u64,
    },
    YieldRateUpdated {
        bps: u16,
    },
    YieldClaimed {
        user: Address,
        amount: u64,
    },
    DepositsPaused {
        by: Address,
    },
    DepositsUnpaused {
        by: Address,
    },
    WithdrawalDelayUpdated {
        seconds: u64,
    },
    WithdrawalRequested {
        user: Address,
        amount: u64,
        at: u64,
    },
    WithdrawalExecuted {
        user: Address,
        amount: u64,
    },
    EmergencyWithdrawn {
        user: Address,
        amount: u64,
    },
}

impl VaultEvent {
    /// Renders the event as one JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_tagged_with_event_name() {
        let user = Address::derive("alice");
        let event = VaultEvent::Deposited {
            user,
            gross: 1_000,
            fee: 10,
            net: 990,
        };
        let json = event.to_json().unwrap();
        assert!(json.starts_with(r#"{"event":"Deposited""#));
        assert!(json.contains(&user.to_hex()));
        let back: VaultEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
