//! # Persisted State
//!
//! Typed reads and writes of the vault's fields, positioned by
//! [`crate::layout::fields`]. This is the only module that turns field specs
//! into region accesses; everything above it speaks in addresses and
//! amounts.

use vaultline_protocol::storage::RegionError;
use vaultline_protocol::{Address, SlotKey, StorageRegion};

use crate::call::WithdrawalRequest;
use crate::layout::fields::{self, PENDING_AMOUNT_OFFSET, PENDING_MEMBER_WIDTH, PENDING_REQUESTED_AT_OFFSET};
use crate::layout::FieldSpec;

type Result<T> = std::result::Result<T, RegionError>;

fn read(region: &StorageRegion, field: &FieldSpec) -> Result<u64> {
    region.read_uint(field.key(), field.offset(), field.width())
}

fn write(region: &mut StorageRegion, field: &FieldSpec, value: u64) -> Result<()> {
    region.write_uint(field.key(), field.offset(), field.width(), value)
}

fn narrow_u8(value: u64) -> u8 {
    // width-1 fields never hold more than a byte
    value.to_be_bytes()[7]
}

fn narrow_u16(value: u64) -> u16 {
    let be = value.to_be_bytes();
    u16::from_be_bytes([be[6], be[7]])
}

/// Field accessors over a vault's storage region.
pub trait VaultStorage {
    fn initialized_version(&self) -> Result<u8>;
    fn set_initialized_version(&mut self, version: u8) -> Result<()>;

    fn reentrancy_status(&self) -> Result<u8>;
    fn set_reentrancy_status(&mut self, status: u8) -> Result<()>;

    fn has_role_entry(&self, role: &[u8; 32], account: &Address) -> Result<bool>;
    fn set_role_entry(&mut self, role: &[u8; 32], account: &Address, held: bool) -> Result<()>;

    fn token(&self) -> Result<Address>;
    fn set_token(&mut self, token: &Address) -> Result<()>;

    fn deposit_fee_bps(&self) -> Result<u16>;
    fn set_deposit_fee_bps(&mut self, bps: u16) -> Result<()>;

    fn total_credited(&self) -> Result<u64>;
    fn set_total_credited(&mut self, amount: u64) -> Result<()>;

    fn balance(&self, account: &Address) -> Result<u64>;
    fn set_balance(&mut self, account: &Address, amount: u64) -> Result<()>;

    fn yield_rate_bps(&self) -> Result<u16>;
    fn set_yield_rate_bps(&mut self, bps: u16) -> Result<()>;

    fn deposits_paused(&self) -> Result<bool>;
    fn set_deposits_paused(&mut self, paused: bool) -> Result<()>;

    fn last_claim(&self, account: &Address) -> Result<u64>;
    fn set_last_claim(&mut self, account: &Address, timestamp: u64) -> Result<()>;

    fn withdrawal_delay_secs(&self) -> Result<u64>;
    fn set_withdrawal_delay_secs(&mut self, seconds: u64) -> Result<()>;

    fn pending_withdrawal(&self, account: &Address) -> Result<WithdrawalRequest>;
    fn set_pending_withdrawal(&mut self, account: &Address, request: &WithdrawalRequest) -> Result<()>;
}

impl VaultStorage for StorageRegion {
    fn initialized_version(&self) -> Result<u8> {
        read(self, &fields::INITIALIZED_VERSION).map(narrow_u8)
    }

    fn set_initialized_version(&mut self, version: u8) -> Result<()> {
        write(self, &fields::INITIALIZED_VERSION, u64::from(version))
    }

    fn reentrancy_status(&self) -> Result<u8> {
        read(self, &fields::REENTRANCY_STATUS).map(narrow_u8)
    }

    fn set_reentrancy_status(&mut self, status: u8) -> Result<()> {
        write(self, &fields::REENTRANCY_STATUS, u64::from(status))
    }

    fn has_role_entry(&self, role: &[u8; 32], account: &Address) -> Result<bool> {
        let inner = fields::ROLES.entry_bytes(role);
        self.read_bool(SlotKey::mapping_address(inner, account), 0)
    }

    fn set_role_entry(&mut self, role: &[u8; 32], account: &Address, held: bool) -> Result<()> {
        let inner = fields::ROLES.entry_bytes(role);
        self.write_bool(SlotKey::mapping_address(inner, account), 0, held)
    }

    fn token(&self) -> Result<Address> {
        self.read_address(fields::TOKEN.key(), fields::TOKEN.offset())
    }

    fn set_token(&mut self, token: &Address) -> Result<()> {
        self.write_address(fields::TOKEN.key(), fields::TOKEN.offset(), token)
    }

    fn deposit_fee_bps(&self) -> Result<u16> {
        read(self, &fields::DEPOSIT_FEE_BPS).map(narrow_u16)
    }

    fn set_deposit_fee_bps(&mut self, bps: u16) -> Result<()> {
        write(self, &fields::DEPOSIT_FEE_BPS, u64::from(bps))
    }

    fn total_credited(&self) -> Result<u64> {
        read(self, &fields::TOTAL_CREDITED)
    }

    fn set_total_credited(&mut self, amount: u64) -> Result<()> {
        write(self, &fields::TOTAL_CREDITED, amount)
    }

    fn balance(&self, account: &Address) -> Result<u64> {
        self.read_uint(fields::BALANCES.entry(account), 0, 8)
    }

    fn set_balance(&mut self, account: &Address, amount: u64) -> Result<()> {
        self.write_uint(fields::BALANCES.entry(account), 0, 8, amount)
    }

    fn yield_rate_bps(&self) -> Result<u16> {
        read(self, &fields::YIELD_RATE_BPS).map(narrow_u16)
    }

    fn set_yield_rate_bps(&mut self, bps: u16) -> Result<()> {
        write(self, &fields::YIELD_RATE_BPS, u64::from(bps))
    }

    fn deposits_paused(&self) -> Result<bool> {
        self.read_bool(fields::DEPOSITS_PAUSED.key(), fields::DEPOSITS_PAUSED.offset())
    }

    fn set_deposits_paused(&mut self, paused: bool) -> Result<()> {
        self.write_bool(fields::DEPOSITS_PAUSED.key(), fields::DEPOSITS_PAUSED.offset(), paused)
    }

    fn last_claim(&self, account: &Address) -> Result<u64> {
        self.read_uint(fields::LAST_CLAIM.entry(account), 0, 8)
    }

    fn set_last_claim(&mut self, account: &Address, timestamp: u64) -> Result<()> {
        self.write_uint(fields::LAST_CLAIM.entry(account), 0, 8, timestamp)
    }

    fn withdrawal_delay_secs(&self) -> Result<u64> {
        read(self, &fields::WITHDRAWAL_DELAY_SECS)
    }

    fn set_withdrawal_delay_secs(&mut self, seconds: u64) -> Result<()> {
        write(self, &fields::WITHDRAWAL_DELAY_SECS, seconds)
    }

    fn pending_withdrawal(&self, account: &Address) -> Result<WithdrawalRequest> {
        let slot = fields::PENDING_WITHDRAWALS.entry(account);
        Ok(WithdrawalRequest {
            amount: self.read_uint(slot, PENDING_AMOUNT_OFFSET, PENDING_MEMBER_WIDTH)?,
            requested_at: self.read_uint(slot, PENDING_REQUESTED_AT_OFFSET, PENDING_MEMBER_WIDTH)?,
        })
    }

    fn set_pending_withdrawal(&mut self, account: &Address, request: &WithdrawalRequest) -> Result<()> {
        let slot = fields::PENDING_WITHDRAWALS.entry(account);
        self.write_uint(slot, PENDING_AMOUNT_OFFSET, PENDING_MEMBER_WIDTH, request.amount)?;
        self.write_uint(slot, PENDING_REQUESTED_AT_OFFSET, PENDING_MEMBER_WIDTH, request.requested_at)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
