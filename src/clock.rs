//! Monotonic millisecond counter advanced by the periodic tick.

use core::sync::atomic::{AtomicU32, Ordering};

/// Milliseconds since boot. Wraps after ~49 days; all comparisons use
/// `wrapping_sub`.
pub struct SystemClock {
    ms: AtomicU32,
}

impl SystemClock {
    pub const fn new() -> Self {
        Self { ms: AtomicU32::new(0) }
    }

    /// Called from the tick source.
    pub fn advance(&self, period_ms: u32) -> u32 {
        self.ms.fetch_add(period_ms, Ordering::AcqRel).wrapping_add(period_ms)
    }

    pub fn now(&self) -> u32 {
        self.ms.load(Ordering::Acquire)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` once `timeout` has passed since `since`.
pub fn elapsed(now: u32, since: u32, timeout: u32) -> bool {
    now.wrapping_sub(since) >= timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_returns_new_time() {
        let clock = SystemClock::new();
        assert_eq!(clock.advance(10), 10);
        assert_eq!(clock.advance(10), 20);
        assert_eq!(clock.now(), 20);
    }

    #[test]
    fn elapsed_survives_wraparound() {
        assert!(elapsed(5, u32::MAX - 4, 10));
        assert!(!elapsed(3, u32::MAX - 4, 10));
    }
}
