//! # Protocol Configuration & Constants
//!
//! Every magic number in Vaultline lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Several of these are baked into persisted storage (the lock words, the
//! template sentinel, the gap size). Changing them after a vault has been
//! deployed corrupts every live instance, so they are effectively frozen.

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10 000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Upper bound for any basis-point parameter (fees, yield rates).
pub const MAX_BPS: u16 = 10_000;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Seconds in a day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// The yield year: exactly 365 days. Leap years are ignored on purpose,
/// because yield must be reproducible bit-for-bit.
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Smallest withdrawal delay an admin may configure: one hour.
pub const MIN_WITHDRAWAL_DELAY_SECS: u64 = 3_600;

/// Largest withdrawal delay an admin may configure: thirty days.
pub const MAX_WITHDRAWAL_DELAY_SECS: u64 = 30 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Size of a storage word in bytes.
pub const WORD_SIZE: usize = 32;

/// Slots reserved for future fields at the end of the first layout.
/// Every later layout carves its new fields out of this gap.
pub const STORAGE_GAP_SLOTS: u64 = 50;

// ---------------------------------------------------------------------------
// Initializer & Guard
// ---------------------------------------------------------------------------

/// Schema version written into a logic template's own storage at
/// deployment. No setup step can ever advance past it.
pub const TEMPLATE_SENTINEL_VERSION: u8 = u8::MAX;

/// Reentrancy lock word: not entered. Zero is also accepted, since a fresh
/// region reads zero before the first guarded call.
pub const LOCK_NOT_ENTERED: u8 = 1;

/// Reentrancy lock word: a guarded call is in progress.
pub const LOCK_ENTERED: u8 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_bounds_match_hour_and_month() {
        assert_eq!(MIN_WITHDRAWAL_DELAY_SECS, 3_600);
        assert_eq!(MAX_WITHDRAWAL_DELAY_SECS, 2_592_000);
        assert!(MIN_WITHDRAWAL_DELAY_SECS < MAX_WITHDRAWAL_DELAY_SECS);
    }

    #[test]
    fn yield_year_ignores_leap_days() {
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
    }

    #[test]
    fn bps_bounds_agree() {
        assert_eq!(MAX_BPS as u64, BPS_DENOMINATOR);
    }

    #[test]
    fn lock_words_are_distinct_and_nonzero() {
        assert_ne!(LOCK_NOT_ENTERED, LOCK_ENTERED);
        assert_ne!(LOCK_ENTERED, 0);
    }
}
