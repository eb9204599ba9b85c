use crate::beat::{BeatDetector, BeatEvent};
use crate::bpm::{AggregatorLimits, HeartRate, HeartRateAggregator, RrOutcome};
use crate::config::SessionConfig;
use crate::filter::{DriftTracker, EnvelopeTracker};

/// Values from the most recent sample, kept for status lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    pub raw: u16,
    pub baseline: f32,
    pub detrended: f32,
    pub envelope: f32,
    pub trigger: f32,
    pub last_rr_ms: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub beat: Option<BeatEvent>,
    pub rr: Option<RrOutcome>,
}

pub struct Pipeline {
    drift: DriftTracker,
    envelope: EnvelopeTracker,
    detector: BeatDetector,
    aggregator: HeartRateAggregator,
    diagnostics: Diagnostics,
}

impl Pipeline {
    /// `first_sample` primes the baseline; `start` is the reference for the first interval.
    pub fn new(config: &SessionConfig, first_sample: u16, start: u32) -> Self {
        let baseline = first_sample as f32;
        Self {
            drift: DriftTracker::primed(config.drift_alpha, baseline),
            envelope: EnvelopeTracker::new(config.envelope_alpha, config.noise_offset),
            detector: BeatDetector::new(config.refractory_ms, start),
            aggregator: HeartRateAggregator::new(AggregatorLimits {
                rr_min_ms: config.rr_min_ms,
                rr_max_ms: config.rr_max_ms,
                beats_per_average: config.beats_per_average,
                staleness_ms: config.staleness_ms,
            }),
            diagnostics: Diagnostics {
                raw: first_sample,
                baseline,
                ..Diagnostics::default()
            },
        }
    }

    pub fn process(&mut self, now: u32, raw: u16) -> SampleOutcome {
        let detrended = self.drift.step(raw as f32);
        let trigger = self.envelope.step(detrended.value);

        self.diagnostics.raw = raw;
        self.diagnostics.baseline = detrended.baseline;
        self.diagnostics.detrended = detrended.value;
        self.diagnostics.envelope = self.envelope.level();
        self.diagnostics.trigger = trigger;

        let Some(beat) = self.detector.update(now, detrended.value, trigger) else {
            return SampleOutcome {
                beat: None,
                rr: None,
            };
        };

        log::debug!(
            "Beat at {} ms, RR {} ms, amplitude {:.1} (trigger {:.1})",
            beat.at,
            beat.rr_ms,
            beat.amplitude,
            trigger
        );
        self.diagnostics.last_rr_ms = Some(beat.rr_ms);
        let rr = self.aggregator.accept(beat.rr_ms, now);

        SampleOutcome {
            beat: Some(beat),
            rr: Some(rr),
        }
    }

    pub fn reading(&self, now: u32) -> HeartRate {
        self.aggregator.reading(now)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SampleSource, SyntheticPulse};

    #[test]
    fn flat_signal_never_beats() {
        let config = SessionConfig::default();
        let mut pipeline = Pipeline::new(&config, 500, 0);
        for i in 1..2000u32 {
            let out = pipeline.process(i * 10, 500);
            assert!(out.beat.is_none());
        }
        assert_eq!(pipeline.reading(20_000), HeartRate::Absent);
        assert!(pipeline.diagnostics().detrended.abs() < 1e-2);
    }

    #[test]
    fn periodic_pulse_yields_sixty_bpm() {
        let config = SessionConfig::default();
        let mut source = SyntheticPulse::new(60.0, config.sample_period_ms);
        let first = source.read();
        let mut pipeline = Pipeline::new(&config, first, 0);
        let mut computed = Vec::new();
        for i in 1..1500u32 {
            let now = i * config.sample_period_ms;
            if let Some(RrOutcome::Computed { bpm }) = pipeline.process(now, source.read()).rr {
                computed.push(bpm);
            }
        }
        assert!(computed.len() >= 3, "computed {:?}", computed);
        assert!(computed.iter().all(|bpm| *bpm == 60.0), "computed {:?}", computed);
        assert_eq!(pipeline.reading(15_000), HeartRate::Present { bpm: 60.0 });
    }
}
