//! # Block Clock
//!
//! Contracts never read wall time. They read the block timestamp, which the
//! runtime owns and only ever moves forward. Tests pin it to a fixed value
//! and advance it by hand, which is what makes yield math reproducible.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A monotonic block timestamp in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClock {
    now: u64,
}

impl BlockClock {
    /// Starts the clock at the current wall time.
    pub fn from_wall_time() -> Self {
        let now = Utc::now().timestamp().max(0) as u64;
        Self { now }
    }

    /// Starts the clock at an explicit unix timestamp.
    pub fn at(timestamp: u64) -> Self {
        Self { now: timestamp }
    }

    /// The current block timestamp.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves the clock forward by `secs`. Saturates instead of wrapping.
    pub fn advance(&mut self, secs: u64) -> u64 {
        self.now = self.now.saturating_add(secs);
        self.now
    }

    /// Renders the current timestamp as RFC 3339, for logs.
    pub fn to_rfc3339(&self) -> String {
        rfc3339(self.now)
    }
}

impl Default for BlockClock {
    fn default() -> Self {
        Self::from_wall_time()
    }
}

/// Renders a unix timestamp as RFC 3339. Out-of-range values render as the
/// raw number.
pub fn rfc3339(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt: DateTime<Utc>| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}
