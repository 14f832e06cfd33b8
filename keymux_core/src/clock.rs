//! Time abstraction for the suspend timer and multipurpose-key timeout.
//!
//! The engine never calls `Instant::now()`/`SystemTime::now()` directly so
//! that tests can drive timers deterministically with a [`VirtualClock`]
//! instead of racing real wall-clock time.

use std::cell::Cell;
use std::time::Instant;

/// Milliseconds since some fixed, clock-specific epoch. Only differences
/// between two `Millis` values from the *same* clock are meaningful.
pub type Millis = u64;

/// A source of monotonic time for the engine.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Wall-clock time via `std::time::Instant`, monotonic from process start.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.start.elapsed().as_millis() as Millis
    }
}

/// A clock tests can set or advance by hand, so timer-expiry logic can be
/// exercised without sleeping.
#[derive(Default)]
pub struct VirtualClock {
    now: Cell<Millis>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    pub fn set(&self, ms: Millis) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_monotonically() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 50);
        clock.set(1000);
        assert_eq!(clock.now_ms(), 1000);
    }
}
