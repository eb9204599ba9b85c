use std::f32::consts::TAU;

/// Full scale of the 10-bit converter.
pub const ADC_MAX: u16 = 1023;

/// Non-blocking read of the latest conversion.
pub trait SampleSource {
    fn read(&mut self) -> u16;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self) -> u16 {
        (**self).read()
    }
}

/// PPG-like waveform: one Gaussian pulse per beat on top of slow baseline wander.
/// Each read advances the waveform by one sample period.
#[derive(Debug, Clone)]
pub struct SyntheticPulse {
    beat_period_ms: f32,
    sample_period_ms: u32,
    t_ms: u64,
    level: f32,
    amplitude: f32,
    width_ms: f32,
    phase_ms: f32,
    wander_amplitude: f32,
    wander_period_ms: f32,
}

impl SyntheticPulse {
    pub fn new(bpm: f32, sample_period_ms: u32) -> Self {
        Self {
            beat_period_ms: 60_000.0 / bpm,
            sample_period_ms,
            t_ms: 0,
            level: 512.0,
            amplitude: 200.0,
            width_ms: 30.0,
            phase_ms: 150.0,
            wander_amplitude: 12.0,
            wander_period_ms: 8000.0,
        }
    }

    pub fn with_wander(mut self, amplitude: f32, period_ms: f32) -> Self {
        self.wander_amplitude = amplitude;
        self.wander_period_ms = period_ms;
        self
    }

    fn value_at(&self, t_ms: f32) -> f32 {
        let into_beat = (t_ms - self.phase_ms).rem_euclid(self.beat_period_ms);
        // distance to the nearest pulse centre, either side
        let offset = into_beat.min(self.beat_period_ms - into_beat);
        let pulse = self.amplitude * (-0.5 * (offset / self.width_ms).powi(2)).exp();
        let wander = self.wander_amplitude * (TAU * t_ms / self.wander_period_ms).sin();
        self.level + wander + pulse
    }
}

impl SampleSource for SyntheticPulse {
    fn read(&mut self) -> u16 {
        let value = self.value_at(self.t_ms as f32);
        self.t_ms += self.sample_period_ms as u64;
        value.round().clamp(0.0, ADC_MAX as f32) as u16
    }
}

/// Constant level; nothing to detect.
#[derive(Debug, Clone, Copy)]
pub struct FlatLine(pub u16);

impl SampleSource for FlatLine {
    fn read(&mut self) -> u16 {
        self.0.min(ADC_MAX)
    }
}
