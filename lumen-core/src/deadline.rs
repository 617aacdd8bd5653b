//! Wrapping millisecond deadlines
//!
//! `now_ms` is a `u32` that wraps after ~49 days, so deadlines compare
//! elapsed time rather than absolute timestamps.

/// A delay that started at a known instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    start_ms: u32,
    delay_ms: u32,
}

impl Deadline {
    /// Deadline `delay_ms` after `now_ms`
    pub const fn after(now_ms: u32, delay_ms: u32) -> Self {
        Self {
            start_ms: now_ms,
            delay_ms,
        }
    }

    /// Check whether the delay has elapsed
    pub fn expired(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.start_ms) >= self.delay_ms
    }
}

/// `Option<Deadline>` where `None` means "due now"
pub fn due(deadline: Option<Deadline>, now_ms: u32) -> bool {
    deadline.map_or(true, |d| d.expired(now_ms))
}
