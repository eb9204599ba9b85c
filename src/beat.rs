use crate::time::{Deadline, ticks_diff};

/// The last three detrended values, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PeakWindow {
    oldest: f32,
    middle: f32,
    newest: f32,
    filled: u8,
}

impl PeakWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits one value and discards the oldest.
    pub fn push(&mut self, value: f32) {
        self.oldest = self.middle;
        self.middle = self.newest;
        self.newest = value;
        self.filled = (self.filled + 1).min(3);
    }

    fn is_full(&self) -> bool {
        self.filled == 3
    }

    /// The middle value if it is a strict local maximum of a full window.
    pub fn peak(&self) -> Option<f32> {
        (self.is_full() && self.middle > self.oldest && self.middle > self.newest)
            .then_some(self.middle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Tick at which the peak was confirmed (one sample after the peak itself).
    pub at: u32,
    /// Milliseconds since the previous detected beat.
    pub rr_ms: u32,
    pub amplitude: f32,
}

#[derive(Debug, Clone)]
pub struct BeatDetector {
    window: PeakWindow,
    refractory_ms: u32,
    lockout: Deadline,
    last_beat: u32,
}

impl BeatDetector {
    /// `start` is the reference for the first interval.
    pub fn new(refractory_ms: u32, start: u32) -> Self {
        Self {
            window: PeakWindow::new(),
            refractory_ms,
            lockout: Deadline::new(),
            last_beat: start,
        }
    }

    pub fn update(&mut self, now: u32, detrended: f32, threshold: f32) -> Option<BeatEvent> {
        self.window.push(detrended);

        if self.lockout.pending(now) {
            return None;
        }

        let amplitude = self.window.peak()?;
        if amplitude <= threshold {
            return None;
        }

        self.lockout.arm(now, self.refractory_ms);
        let rr_ms = ticks_diff(now, self.last_beat).max(0) as u32;
        self.last_beat = now;

        Some(BeatEvent {
            at: now,
            rr_ms,
            amplitude,
        })
    }

    #[cfg(test)]
    fn in_lockout(&self, now: u32) -> bool {
        self.lockout.pending(now)
    }

    #[cfg(test)]
    fn last_beat(&self) -> u32 {
        self.last_beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ticks_add;
    use proptest::prelude::*;

    fn feed(det: &mut BeatDetector, start: u32, step: u32, values: &[f32], threshold: f32) -> Vec<BeatEvent> {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| det.update(ticks_add(start, i as u32 * step), v, threshold))
            .collect()
    }

    #[test]
    fn window_needs_three_values() {
        let mut w = PeakWindow::new();
        w.push(0.0);
        w.push(10.0);
        assert_eq!(w.peak(), None);
        w.push(0.0);
        assert_eq!(w.peak(), Some(10.0));
    }

    #[test]
    fn plateau_is_not_a_peak() {
        let mut w = PeakWindow::new();
        for v in [1.0, 5.0, 5.0] {
            w.push(v);
        }
        assert_eq!(w.peak(), None);
    }

    #[test]
    fn fires_one_sample_after_peak() {
        let mut det = BeatDetector::new(250, 0);
        let beats = feed(&mut det, 0, 10, &[0.0, 1.0, 20.0, 3.0, 0.0], 5.0);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].at, 30);
        assert_eq!(beats[0].rr_ms, 30);
        assert_eq!(beats[0].amplitude, 20.0);
    }

    #[test]
    fn below_threshold_is_ignored() {
        let mut det = BeatDetector::new(250, 0);
        let beats = feed(&mut det, 0, 10, &[0.0, 4.0, 0.0], 5.0);
        assert!(beats.is_empty());
    }

    #[test]
    fn second_peak_inside_refractory_is_dropped() {
        let mut det = BeatDetector::new(250, 0);
        let mut values = vec![0.0, 20.0, 0.0];
        values.extend([0.0, 30.0, 0.0]);
        let beats = feed(&mut det, 0, 10, &values, 5.0);
        assert_eq!(beats.len(), 1);
        assert!(det.in_lockout(100));
    }

    #[test]
    fn intervals_measured_between_beats() {
        let mut det = BeatDetector::new(250, 0);
        assert!(det.update(990, 0.0, 5.0).is_none());
        assert!(det.update(1000, 20.0, 5.0).is_none());
        let first = det.update(1010, 0.0, 5.0).unwrap();
        assert_eq!(first.rr_ms, 1010);
        assert!(det.update(1990, 0.0, 5.0).is_none());
        assert!(det.update(2000, 20.0, 5.0).is_none());
        let second = det.update(2010, 0.0, 5.0).unwrap();
        assert_eq!(second.rr_ms, 1000);
        assert_eq!(det.last_beat(), 2010);
    }

    #[test]
    fn works_across_counter_wrap() {
        let start = u32::MAX - 15;
        let mut det = BeatDetector::new(250, start);
        let beats = feed(&mut det, start, 10, &[0.0, 20.0, 0.0], 5.0);
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].rr_ms, 20);
        assert!(det.in_lockout(ticks_add(start, 200)));
        assert!(!det.in_lockout(ticks_add(start, 270)));
    }

    proptest! {
        #[test]
        fn no_two_beats_within_refractory(
            values in proptest::collection::vec(-100.0f32..100.0, 3..400),
            start in any::<u32>(),
            refractory in 20u32..500,
        ) {
            let mut det = BeatDetector::new(refractory, start);
            let beats = feed(&mut det, start, 10, &values, 0.0);
            for pair in beats.windows(2) {
                prop_assert!(ticks_diff(pair[1].at, pair[0].at) >= refractory as i32);
            }
        }
    }
}
