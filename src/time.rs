use std::thread;
use std::time::{Duration, Instant};

/// Signed distance `a - b` in milliseconds, correct across wraparound as long
/// as the real distance fits in an `i32`. Raw ticks are never compared directly.
#[inline]
pub fn ticks_diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

#[inline]
pub fn ticks_add(t: u32, ms: u32) -> u32 {
    t.wrapping_add(ms)
}

/// A one-shot deadline. Disarmed until [`Deadline::arm`] is called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<u32>,
}

impl Deadline {
    pub fn new() -> Self {
        Self { at: None }
    }

    /// A deadline that is already due at `now`.
    pub fn at(now: u32) -> Self {
        Self { at: Some(now) }
    }

    pub fn arm(&mut self, now: u32, duration_ms: u32) {
        self.at = Some(ticks_add(now, duration_ms));
    }

    pub fn clear(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// True when armed and `now` has reached the deadline.
    pub fn due(&self, now: u32) -> bool {
        self.at.is_some_and(|at| ticks_diff(now, at) >= 0)
    }

    /// True when armed and the deadline is still in the future.
    pub fn pending(&self, now: u32) -> bool {
        self.at.is_some_and(|at| ticks_diff(now, at) < 0)
    }
}

/// Source of the wrapping millisecond counter.
pub trait Clock {
    fn now_ms(&mut self) -> u32;

    /// Blocking wait. Only used outside the sampling path.
    fn pause(&mut self, ms: u32);

    /// Hint called once per idle loop iteration.
    fn relax(&mut self) {}
}

/// Wall-clock ticks since construction, truncated to `u32` like a device counter.
pub struct SystemClock {
    origin: Instant,
    offset: u32,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Starts the counter at `offset`, which lets a session run across the wrap point.
    pub fn with_offset(offset: u32) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&mut self) -> u32 {
        let elapsed = self.origin.elapsed().as_millis() as u32;
        ticks_add(self.offset, elapsed)
    }

    fn pause(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }

    fn relax(&mut self) {
        thread::yield_now();
    }
}

/// Deterministic virtual time. Each read returns the current tick and then
/// advances it by `step_ms`.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: u32,
    step_ms: u32,
}

impl SimulatedClock {
    pub fn new(start: u32, step_ms: u32) -> Self {
        Self {
            now: start,
            step_ms,
        }
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&mut self) -> u32 {
        let now = self.now;
        self.now = ticks_add(self.now, self.step_ms);
        now
    }

    fn pause(&mut self, ms: u32) {
        self.now = ticks_add(self.now, ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn diff_across_wrap() {
        let before = u32::MAX - 9;
        let after = ticks_add(before, 20);
        assert_eq!(after, 10);
        assert_eq!(ticks_diff(after, before), 20);
        assert_eq!(ticks_diff(before, after), -20);
    }

    #[test]
    fn disarmed_deadline_is_never_due() {
        let d = Deadline::new();
        assert!(!d.due(0));
        assert!(!d.due(u32::MAX));
        assert!(!d.pending(0));
    }

    #[test]
    fn deadline_due_at_exact_tick() {
        let mut d = Deadline::new();
        d.arm(1000, 60);
        assert!(d.pending(1059));
        assert!(!d.due(1059));
        assert!(d.due(1060));
        d.clear();
        assert!(!d.due(2000));
    }

    #[test]
    fn simulated_clock_steps_per_read() {
        let mut clock = SimulatedClock::new(u32::MAX, 1);
        assert_eq!(clock.now_ms(), u32::MAX);
        assert_eq!(clock.now_ms(), 0);
        clock.pause(10);
        assert_eq!(clock.now_ms(), 11);
    }

    proptest! {
        #[test]
        fn deadline_respects_wraparound(start in any::<u32>(), duration in 0u32..1_000_000, probe in 0u32..2_000_000) {
            let mut d = Deadline::new();
            d.arm(start, duration);
            let now = ticks_add(start, probe);
            prop_assert_eq!(d.due(now), probe >= duration);
            prop_assert_eq!(d.pending(now), probe < duration);
        }

        #[test]
        fn diff_inverts_add(t in any::<u32>(), ms in 0u32..=(i32::MAX as u32)) {
            prop_assert_eq!(ticks_diff(ticks_add(t, ms), t), ms as i32);
        }
    }
}
