/// `y[n] = y[n-1] * alpha + x[n] * (1 - alpha)`
#[derive(Debug, Clone)]
pub struct IirFilter {
    alpha: f32,
    previous_output: f32,
}

impl IirFilter {
    pub fn new(alpha: f32) -> Self {
        Self::with_initial(alpha, 0.0)
    }

    pub fn with_initial(alpha: f32, initial: f32) -> Self {
        Self {
            alpha,
            previous_output: initial,
        }
    }

    pub fn step(&mut self, input: f32) -> f32 {
        let output = self.previous_output * self.alpha + input * (1.0 - self.alpha);
        self.previous_output = output;
        output
    }

    pub fn output(&self) -> f32 {
        self.previous_output
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Detrended {
    pub baseline: f32,
    pub value: f32,
}

/// Tracks slow baseline wander. Larger alpha follows drift more slowly.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    filter: IirFilter,
}

impl DriftTracker {
    /// Starts the baseline at `initial` so the first detrended values sit near zero.
    pub fn primed(alpha: f32, initial: f32) -> Self {
        Self {
            filter: IirFilter::with_initial(alpha, initial),
        }
    }

    pub fn step(&mut self, raw: f32) -> Detrended {
        let baseline = self.filter.step(raw);
        Detrended {
            baseline,
            value: raw - baseline,
        }
    }
}

/// Smoothed absolute amplitude of the detrended signal plus a fixed noise offset.
#[derive(Debug, Clone)]
pub struct EnvelopeTracker {
    filter: IirFilter,
    noise_offset: f32,
}

impl EnvelopeTracker {
    pub fn new(alpha: f32, noise_offset: f32) -> Self {
        Self {
            filter: IirFilter::new(alpha),
            noise_offset,
        }
    }

    /// Feeds one detrended value and returns the detection threshold.
    pub fn step(&mut self, detrended: f32) -> f32 {
        self.filter.step(detrended.abs()) + self.noise_offset
    }

    pub fn level(&self) -> f32 {
        self.filter.output()
    }

    #[cfg(test)]
    fn threshold(&self) -> f32 {
        self.filter.output() + self.noise_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_step_matches_recurrence() {
        let mut f = IirFilter::with_initial(0.9, 10.0);
        let y = f.step(20.0);
        assert!((y - 11.0).abs() < 1e-5);
        assert_eq!(f.output(), y);
    }

    #[test]
    fn primed_tracker_starts_flat() {
        let mut drift = DriftTracker::primed(0.995, 512.0);
        let d = drift.step(512.0);
        assert!((d.baseline - 512.0).abs() < 1e-3);
        assert!(d.value.abs() < 1e-3);
    }

    #[test]
    fn envelope_tracks_magnitude() {
        let mut env = EnvelopeTracker::new(0.5, 2.0);
        let t = env.step(-8.0);
        assert!((env.level() - 4.0).abs() < 1e-6);
        assert!((t - 6.0).abs() < 1e-6);
        assert_eq!(env.threshold(), t);
    }

    proptest! {
        #[test]
        fn constant_input_converges(level in 0u16..1024, alpha in 0.5f32..0.995) {
            let mut drift = DriftTracker::primed(alpha, 0.0);
            let mut last = Detrended::default();
            for _ in 0..5000 {
                last = drift.step(level as f32);
            }
            let tol = (level as f32 * 1e-3).max(1e-2);
            prop_assert!((last.baseline - level as f32).abs() < tol);
            prop_assert!(last.value.abs() < tol);
        }

        #[test]
        fn step_never_overshoots(
            alpha in 0.01f32..0.99,
            previous in -1000.0f32..1000.0,
            input in -1000.0f32..1000.0,
        ) {
            prop_assume!((previous - input).abs() > 1.0);
            let mut f = IirFilter::with_initial(alpha, previous);
            let y = f.step(input);
            let (lo, hi) = if previous < input { (previous, input) } else { (input, previous) };
            prop_assert!(y > lo && y < hi, "{y} not strictly inside ({lo}, {hi})");
            prop_assert!(y.is_finite());
        }
    }
}
