use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Millisecond tick source for the control loop.
///
/// - now_ms(): free-running counter that wraps at `u32::MAX`
/// - sleep(): paces the outer loop (implementations may simulate)
/// - ms_since(): wrap-safe signed distance from a stored start tick
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `start`, negative if `start` lies ahead of now.
    fn ms_since(&self, start: u32) -> i32 {
        self.now_ms().wrapping_sub(start) as i32
    }
}

/// Real-time clock backed by `std::time::Instant`, anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        self.origin.elapsed().as_millis() as u32
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time is moved by hand.
///
/// Clones share the same counter, so a test can keep one handle while the
/// loop under test owns another. `sleep(d)` advances time without blocking.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<u32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at an arbitrary tick (useful for wrap-around tests).
    pub fn starting_at(ms: u32) -> Self {
        Self {
            now: Arc::new(Mutex::new(ms)),
        }
    }

    /// Advance the clock by `ms`, wrapping at `u32::MAX`.
    pub fn advance(&self, ms: u32) {
        if let Ok(mut now) = self.now.lock() {
            *now = now.wrapping_add(ms);
        }
    }

    /// Set the absolute tick.
    pub fn set(&self, ms: u32) {
        if let Ok(mut now) = self.now.lock() {
            *now = ms;
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.lock().map(|g| *g).unwrap_or(0)
    }

    fn sleep(&self, d: Duration) {
        self.advance(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_wraps_and_reports_signed_distance() {
        let clock = ManualClock::starting_at(u32::MAX - 10);
        let start = clock.now_ms();
        clock.advance(25);
        assert_eq!(clock.now_ms(), 14);
        assert_eq!(clock.ms_since(start), 25);
        assert_eq!(clock.ms_since(clock.now_ms().wrapping_add(5)), -5);
    }

    #[test]
    fn clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        b.sleep(Duration::from_millis(150));
        assert_eq!(a.now_ms(), 150);
    }
}
