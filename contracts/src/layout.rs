//! # Storage Layout
//!
//! Where every persisted field lives, for every version that ever shipped.
//!
//! A proxy instance keeps one storage region across code swaps. The new
//! code has no idea what the old code meant by slot 6; it just reads slot 6.
//! So the layout is a contract with the past: once a field has a slot, an
//! offset and a width, it keeps them forever.
//!
//! ## Slot Map
//!
//! | Slot   | Field(s)                                            | Since |
//! |--------|-----------------------------------------------------|-------|
//! | 0      | `initialized_version` u8 @0                         | V1    |
//! | 1      | `reentrancy_status` u8 @0                           | V1    |
//! | 2      | `roles` role → account → bool                       | V1    |
//! | 3      | `token` address @0, `deposit_fee_bps` u16 @20       | V1    |
//! | 4      | `total_credited` u64 @0                             | V1    |
//! | 5      | `balances` account → u64                            | V1    |
//! | 6      | `yield_rate_bps` u16 @0, `deposits_paused` bool @2  | V2    |
//! | 7      | `last_claim` account → u64                          | V2    |
//! | 8      | `withdrawal_delay_secs` u64 @0                      | V3    |
//! | 9      | `pending_withdrawals` account → {u64 @0, u64 @8}    | V3    |
//! | ..56   | reserved gap                                        |       |
//!
//! V1 reserved 50 slots after its last field. Each later version carves its
//! new fields off the front of that gap, and the gap shrinks by exactly the
//! number of slots consumed, so the end of the reserved region never moves.
//!
//! Nothing at runtime can catch a layout mistake, because old bytes are
//! still perfectly readable as the wrong thing. [`StorageLayout::verify_extends`]
//! is the check, and the proxy runs it before every upgrade.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use vaultline_protocol::config::{STORAGE_GAP_SLOTS, WORD_SIZE};
use vaultline_protocol::{Address, SlotKey};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways a layout can fail to extend its predecessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A field of the previous layout is missing.
    #[error("field `{name}` was removed")]
    FieldRemoved {
        /// Field name.
        name: &'static str,
    },

    /// A field changed slot or offset.
    #[error("field `{name}` moved from slot {from_slot}@{from_offset} to slot {to_slot}@{to_offset}")]
    FieldMoved {
        /// Field name.
        name: &'static str,
        /// Previous slot.
        from_slot: u64,
        /// Previous offset.
        from_offset: u8,
        /// New slot.
        to_slot: u64,
        /// New offset.
        to_offset: u8,
    },

    /// A field changed width or kind.
    #[error("field `{name}` was resized from {from_width} to {to_width} bytes or changed kind")]
    FieldResized {
        /// Field name.
        name: &'static str,
        /// Previous width.
        from_width: u8,
        /// New width.
        to_width: u8,
    },

    /// A new field was placed outside the previous reserved gap.
    #[error("new field `{name}` at slot {slot} lies outside the reserved gap {gap_start}..{gap_end}")]
    FieldOutsideGap {
        /// Field name.
        name: &'static str,
        /// Slot the field occupies.
        slot: u64,
        /// Previous gap start.
        gap_start: u64,
        /// Previous gap end, exclusive.
        gap_end: u64,
    },

    /// Two fields share bytes, or a field sits inside the gap.
    #[error("field `{name}` overlaps `{other}` in slot {slot}")]
    Overlap {
        /// Field name.
        name: &'static str,
        /// The field or region it collides with.
        other: &'static str,
        /// The shared slot.
        slot: u64,
    },

    /// A field's byte range does not fit in one word.
    #[error("field `{name}` does not fit in a word: offset {offset} + width {width}")]
    FieldTooWide {
        /// Field name.
        name: &'static str,
        /// Offset in the slot.
        offset: u8,
        /// Width in bytes.
        width: u8,
    },

    /// The reserved gap did not shrink by exactly the consumed slots.
    #[error("gap mismatch: expected {expected_start}+{expected_len}, found {actual_start}+{actual_len}")]
    GapMismatch {
        /// Gap start implied by the previous layout.
        expected_start: u64,
        /// Gap length implied by the previous layout.
        expected_len: u64,
        /// Gap start actually declared.
        actual_start: u64,
        /// Gap length actually declared.
        actual_len: u64,
    },
}

// ---------------------------------------------------------------------------
// Field Specs
// ---------------------------------------------------------------------------

/// How a field's slot is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Big-endian unsigned integer packed at `(offset, width)`.
    Uint,
    /// One byte, non-zero is true.
    Bool,
    /// 20-byte address.
    Address,
    /// The slot is the base of a one-level mapping; entries live at derived keys.
    Mapping,
    /// The slot is the base of a two-level mapping.
    NestedMapping,
}

/// The position of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Stable field name. Used to match fields across versions.
    pub name: &'static str,
    /// Fixed slot index.
    pub slot: u64,
    /// Byte offset inside the slot.
    pub offset: u8,
    /// Width in bytes. Mapping bases claim the whole word.
    pub width: u8,
    /// Interpretation.
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(name: &'static str, slot: u64, offset: u8, width: u8, kind: FieldKind) -> Self {
        Self {
            name,
            slot,
            offset,
            width,
            kind,
        }
    }

    /// The fixed slot key of this field, or the base key for mappings.
    pub fn key(&self) -> SlotKey {
        SlotKey::fixed(self.slot)
    }

    /// The entry key of a mapping field for `account`.
    pub fn entry(&self, account: &Address) -> SlotKey {
        SlotKey::mapping_address(self.key(), account)
    }

    /// The entry key of a mapping field for an arbitrary byte key. For a
    /// nested mapping this is the base of the inner mapping.
    pub fn entry_bytes(&self, key: &[u8]) -> SlotKey {
        SlotKey::mapping(self.key(), key)
    }

    /// Byte offset as `usize`, for region accessors.
    pub fn offset(&self) -> usize {
        usize::from(self.offset)
    }

    /// Width as `usize`, for region accessors.
    pub fn width(&self) -> usize {
        usize::from(self.width)
    }

    fn end(&self) -> usize {
        self.offset() + self.width()
    }

    fn overlaps(&self, other: &FieldSpec) -> bool {
        self.slot == other.slot && self.offset() < other.end() && other.offset() < self.end()
    }
}

/// Field positions, shared by every version that knows the field.
pub mod fields {
    use super::{FieldKind, FieldSpec};

    pub const INITIALIZED_VERSION: FieldSpec =
        FieldSpec::new("initialized_version", 0, 0, 1, FieldKind::Uint);
    pub const REENTRANCY_STATUS: FieldSpec =
        FieldSpec::new("reentrancy_status", 1, 0, 1, FieldKind::Uint);
    pub const ROLES: FieldSpec = FieldSpec::new("roles", 2, 0, 32, FieldKind::NestedMapping);
    pub const TOKEN: FieldSpec = FieldSpec::new("token", 3, 0, 20, FieldKind::Address);
    pub const DEPOSIT_FEE_BPS: FieldSpec =
        FieldSpec::new("deposit_fee_bps", 3, 20, 2, FieldKind::Uint);
    pub const TOTAL_CREDITED: FieldSpec =
        FieldSpec::new("total_credited", 4, 0, 8, FieldKind::Uint);
    pub const BALANCES: FieldSpec = FieldSpec::new("balances", 5, 0, 32, FieldKind::Mapping);

    pub const YIELD_RATE_BPS: FieldSpec =
        FieldSpec::new("yield_rate_bps", 6, 0, 2, FieldKind::Uint);
    pub const DEPOSITS_PAUSED: FieldSpec =
        FieldSpec::new("deposits_paused", 6, 2, 1, FieldKind::Bool);
    pub const LAST_CLAIM: FieldSpec = FieldSpec::new("last_claim", 7, 0, 32, FieldKind::Mapping);

    pub const WITHDRAWAL_DELAY_SECS: FieldSpec =
        FieldSpec::new("withdrawal_delay_secs", 8, 0, 8, FieldKind::Uint);
    pub const PENDING_WITHDRAWALS: FieldSpec =
        FieldSpec::new("pending_withdrawals", 9, 0, 32, FieldKind::Mapping);

    /// Offset of `amount` inside a pending withdrawal entry.
    pub const PENDING_AMOUNT_OFFSET: usize = 0;
    /// Offset of `requested_at` inside a pending withdrawal entry.
    pub const PENDING_REQUESTED_AT_OFFSET: usize = 8;
    /// Width of both pending withdrawal members.
    pub const PENDING_MEMBER_WIDTH: usize = 8;
}

// ---------------------------------------------------------------------------
// StorageLayout
// ---------------------------------------------------------------------------

/// Reserved, unused slots at the end of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageGap {
    /// First reserved slot.
    pub start: u64,
    /// Number of reserved slots.
    pub len: u64,
}

impl StorageGap {
    /// One past the last reserved slot.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    fn contains(&self, slot: u64) -> bool {
        slot >= self.start && slot < self.end()
    }
}

/// The complete layout one code version reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    /// Schema version the layout belongs to.
    pub schema: u8,
    /// Every field, in declaration order.
    pub fields: &'static [FieldSpec],
    /// Reserved expansion capacity.
    pub gap: StorageGap,
}

/// First slot after the last V1 field.
const V1_GAP_START: u64 = 6;

pub const LAYOUT_V1: StorageLayout = StorageLayout {
    schema: 1,
    fields: &[
        fields::INITIALIZED_VERSION,
        fields::REENTRANCY_STATUS,
        fields::ROLES,
        fields::TOKEN,
        fields::DEPOSIT_FEE_BPS,
        fields::TOTAL_CREDITED,
        fields::BALANCES,
    ],
    gap: StorageGap {
        start: V1_GAP_START,
        len: STORAGE_GAP_SLOTS,
    },
};

pub const LAYOUT_V2: StorageLayout = StorageLayout {
    schema: 2,
    fields: &[
        fields::INITIALIZED_VERSION,
        fields::REENTRANCY_STATUS,
        fields::ROLES,
        fields::TOKEN,
        fields::DEPOSIT_FEE_BPS,
        fields::TOTAL_CREDITED,
        fields::BALANCES,
        fields::YIELD_RATE_BPS,
        fields::DEPOSITS_PAUSED,
        fields::LAST_CLAIM,
    ],
    gap: StorageGap {
        start: V1_GAP_START + 2,
        len: STORAGE_GAP_SLOTS - 2,
    },
};

pub const LAYOUT_V3: StorageLayout = StorageLayout {
    schema: 3,
    fields: &[
        fields::INITIALIZED_VERSION,
        fields::REENTRANCY_STATUS,
        fields::ROLES,
        fields::TOKEN,
        fields::DEPOSIT_FEE_BPS,
        fields::TOTAL_CREDITED,
        fields::BALANCES,
        fields::YIELD_RATE_BPS,
        fields::DEPOSITS_PAUSED,
        fields::LAST_CLAIM,
        fields::WITHDRAWAL_DELAY_SECS,
        fields::PENDING_WITHDRAWALS,
    ],
    gap: StorageGap {
        start: V1_GAP_START + 4,
        len: STORAGE_GAP_SLOTS - 4,
    },
};

impl StorageLayout {
    /// Looks a field up by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks the layout on its own: every field fits in a word, no two
    /// fields share a byte, and nothing lives inside the gap.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.width == 0 || field.end() > WORD_SIZE {
                return Err(LayoutError::FieldTooWide {
                    name: field.name,
                    offset: field.offset,
                    width: field.width,
                });
            }
            if self.gap.contains(field.slot) {
                return Err(LayoutError::Overlap {
                    name: field.name,
                    other: "storage gap",
                    slot: field.slot,
                });
            }
            if let Some(other) = self.fields[..i].iter().find(|o| o.overlaps(field)) {
                return Err(LayoutError::Overlap {
                    name: field.name,
                    other: other.name,
                    slot: field.slot,
                });
            }
        }
        Ok(())
    }

    /// Checks that `self` is an append-only extension of `previous`.
    ///
    /// Every old field must keep its slot, offset, width and kind. New
    /// fields must come out of the old gap, and the gap must shrink by
    /// exactly the number of slots they consume. An identical layout is a
    /// valid (empty) extension.
    pub fn verify_extends(&self, previous: &StorageLayout) -> Result<(), LayoutError> {
        self.validate()?;

        for old in previous.fields {
            let Some(new) = self.field(old.name) else {
                return Err(LayoutError::FieldRemoved { name: old.name });
            };
            if new.slot != old.slot || new.offset != old.offset {
                return Err(LayoutError::FieldMoved {
                    name: old.name,
                    from_slot: old.slot,
                    from_offset: old.offset,
                    to_slot: new.slot,
                    to_offset: new.offset,
                });
            }
            if new.width != old.width || new.kind != old.kind {
                return Err(LayoutError::FieldResized {
                    name: old.name,
                    from_width: old.width,
                    to_width: new.width,
                });
            }
        }

        let mut consumed = BTreeSet::new();
        for new in self.fields.iter().filter(|f| previous.field(f.name).is_none()) {
            if !previous.gap.contains(new.slot) {
                return Err(LayoutError::FieldOutsideGap {
                    name: new.name,
                    slot: new.slot,
                    gap_start: previous.gap.start,
                    gap_end: previous.gap.end(),
                });
            }
            consumed.insert(new.slot);
        }

        let consumed = consumed.len() as u64;
        let expected_start = previous.gap.start + consumed;
        let expected_len = previous.gap.len.saturating_sub(consumed);
        if self.gap.start != expected_start || self.gap.len != expected_len {
            return Err(LayoutError::GapMismatch {
                expected_start,
                expected_len,
                actual_start: self.gap.start,
                actual_len: self.gap.len,
            });
        }
        Ok(())
    }

    /// A serializable rendering of this layout.
    pub fn report(&self) -> LayoutReport {
        LayoutReport {
            schema: self.schema,
            fields: self
                .fields
                .iter()
                .map(|f| FieldReport {
                    name: f.name.to_string(),
                    slot: f.slot,
                    offset: f.offset,
                    width: f.width,
                    kind: f.kind,
                })
                .collect(),
            gap: self.gap,
        }
    }
}

/// The layout for schema `schema`, if one exists.
pub fn layout_for(schema: u8) -> Option<&'static StorageLayout> {
    match schema {
        1 => Some(&LAYOUT_V1),
        2 => Some(&LAYOUT_V2),
        3 => Some(&LAYOUT_V3),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One field in a [`LayoutReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub name: String,
    pub slot: u64,
    pub offset: u8,
    pub width: u8,
    pub kind: FieldKind,
}

/// A layout rendered for humans and golden files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub schema: u8,
    pub fields: Vec<FieldReport>,
    pub gap: StorageGap,
}

impl LayoutReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
