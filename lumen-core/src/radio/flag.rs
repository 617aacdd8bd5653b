//! Packet-available flag
//!
//! The only state shared with interrupt context. The interrupt side sets it
//! and returns; the main loop consumes it with test-and-clear.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Set from the radio interrupt, consumed by the receive coordinator
pub struct PacketFlag {
    pending: AtomicBool,
    signals: AtomicU32,
}

impl Default for PacketFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketFlag {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            signals: AtomicU32::new(0),
        }
    }

    /// Record that a packet is waiting. Interrupt safe, never blocks.
    pub fn signal(&self) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Consume the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Total number of interrupts seen
    pub fn signal_count(&self) -> u32 {
        self.signals.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears() {
        let flag = PacketFlag::new();
        assert!(!flag.take());
        flag.signal();
        assert!(flag.is_pending());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_signals_coalesce() {
        let flag = PacketFlag::new();
        flag.signal();
        flag.signal();
        assert!(flag.take());
        assert!(!flag.take());
        assert_eq!(flag.signal_count(), 2);
    }
}
