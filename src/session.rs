use serde::Serialize;

use crate::bpm::HeartRate;
use crate::channels::Uploader;
use crate::config::{ConfigError, SessionConfig};
use crate::output::{UploadKind, UploadOutcome, UploadRequest};
use crate::pipeline::Pipeline;
use crate::scheduler::{ActuatorSink, Actuators};
use crate::source::SampleSource;
use crate::time::{Clock, Deadline, ticks_diff};

/// Poll interval of the end-of-session tone drain.
const DRAIN_POLL_MS: u32 = 10;

/// Absorbs `f32` error in the scaled upload delta.
const DELTA_SLACK_TENTHS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummarySample {
    pub t_ms: u32,
    pub hr: HeartRate,
}

/// Append-only record of the reporting ticks, uploaded once at session end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub duration_ms: u32,
    pub report_interval_ms: u32,
    pub samples: Vec<SummarySample>,
}

impl SessionSummary {
    fn new(config: &SessionConfig) -> Self {
        Self {
            duration_ms: config.session_ms,
            report_interval_ms: config.report_interval_ms,
            samples: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    Finished,
}

pub struct Session<S, A, U>
where
    S: SampleSource,
    A: ActuatorSink,
    U: Uploader,
{
    config: SessionConfig,
    source: S,
    actuators: Actuators<A>,
    uploader: U,
    pipeline: Pipeline,
    start: u32,
    end: Deadline,
    next_sample: Deadline,
    next_report: Deadline,
    summary: SessionSummary,
    last_forwarded: Option<f32>,
    beats: u32,
}

impl<S, A, U> Session<S, A, U>
where
    S: SampleSource,
    A: ActuatorSink,
    U: Uploader,
{
    /// Validates the configuration, primes the baseline from one sample and
    /// sounds the start tone. Nothing is created if the configuration is invalid.
    pub fn start(
        config: SessionConfig,
        mut source: S,
        sink: A,
        uploader: U,
        now: u32,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let first = source.read();
        let pipeline = Pipeline::new(&config, first, now);
        let mut actuators =
            Actuators::new(sink, config.led_blink_ms, config.buzzer_active_high, now);
        actuators.beep(now, config.tone_ms);

        let mut end = Deadline::new();
        end.arm(now, config.session_ms);

        log::info!(
            "Session started for {} ms (patient: {}, first sample: {})",
            config.session_ms,
            config.patient_id,
            first
        );

        Ok(Self {
            summary: SessionSummary::new(&config),
            config,
            source,
            actuators,
            uploader,
            pipeline,
            start: now,
            end,
            next_sample: Deadline::at(now),
            next_report: Deadline::at(now),
            last_forwarded: None,
            beats: 0,
        })
    }

    /// One loop iteration at `now`. Never blocks.
    pub fn tick(&mut self, now: u32) -> Tick {
        self.actuators.step_led(now);

        if self.end.due(now) {
            return Tick::Finished;
        }

        self.actuators.expire_buzzer(now);
        self.collect_outcomes();

        if self.next_sample.due(now) {
            self.next_sample.arm(now, self.config.sample_period_ms);
            self.sample(now);
        }

        if self.next_report.due(now) {
            self.next_report.arm(now, self.config.report_interval_ms);
            self.report(now);
        }

        Tick::Running
    }

    /// Silences the actuators, plays the end tone to completion, then hands
    /// the summary to the uploader.
    pub fn finish<C: Clock + ?Sized>(mut self, clock: &mut C) -> SessionSummary {
        self.actuators.quiesce();
        self.actuators.beep(clock.now_ms(), self.config.tone_ms);
        loop {
            self.actuators.expire_buzzer(clock.now_ms());
            if !self.actuators.buzzer_sounding() {
                break;
            }
            clock.pause(DRAIN_POLL_MS);
        }

        log::info!(
            "Session done: {} beat(s), {} summary sample(s)",
            self.beats,
            self.summary.samples.len()
        );

        self.collect_outcomes();
        match self.summary.to_json() {
            Ok(summary_json) => {
                let queued = self.uploader.submit(UploadRequest::Summary {
                    patient_id: self.config.patient_id.clone(),
                    summary_json,
                });
                if !queued {
                    log::warn!("Session summary was not handed to the uploader");
                }
            }
            Err(e) => log::error!("Failed to encode session summary: {}", e),
        }

        self.summary
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn actuators(&self) -> &Actuators<A> {
        &self.actuators
    }

    fn sample(&mut self, now: u32) {
        let raw = self.source.read();
        let outcome = self.pipeline.process(now, raw);
        if outcome.beat.is_some() {
            self.beats += 1;
            if self.config.beep_on_beat {
                self.actuators.beep(now, self.config.beep_ms);
            }
        }
    }

    fn report(&mut self, now: u32) {
        let t_ms = ticks_diff(now, self.start).max(0) as u32;
        let hr = self.pipeline.reading(now);
        self.summary.samples.push(SummarySample { t_ms, hr });

        let d = self.pipeline.diagnostics();
        match hr {
            HeartRate::Present { bpm } => log::info!(
                "Heart rate: {} BPM (rr: {:?} ms, detrended: {:.0}, envelope: {:.0}, trigger: {:.0})",
                bpm,
                d.last_rr_ms,
                d.detrended,
                d.envelope,
                d.trigger
            ),
            _ => log::info!(
                "No heart rate at {} ms ({:?}) raw: {}, baseline: {:.0}, detrended: {:.0}, envelope: {:.0}, trigger: {:.0}, last rr: {:?}",
                t_ms,
                hr,
                d.raw,
                d.baseline,
                d.detrended,
                d.envelope,
                d.trigger,
                d.last_rr_ms
            ),
        }

        if let Some(bpm) = hr.bpm()
            && self.should_forward(bpm)
        {
            self.uploader.submit(UploadRequest::Reading {
                patient_id: self.config.patient_id.clone(),
                bpm,
                timestamp: None,
                notes: Some(format!("session t={} ms", t_ms)),
            });
        }
    }

    fn should_forward(&self, bpm: f32) -> bool {
        self.last_forwarded
            .is_none_or(|last| moved_by_at_least(last, bpm, self.config.upload_delta_bpm))
    }

    fn collect_outcomes(&mut self) {
        while let Some(outcome) = self.uploader.poll_outcome() {
            match outcome {
                UploadOutcome {
                    kind: UploadKind::Reading,
                    bpm: Some(bpm),
                    success: true,
                } => self.last_forwarded = Some(bpm),
                UploadOutcome {
                    kind: UploadKind::Reading,
                    success: false,
                    ..
                } => log::warn!("Heart rate upload failed"),
                UploadOutcome {
                    kind: UploadKind::Summary,
                    success,
                    ..
                } => log::debug!("Session summary upload finished (success: {})", success),
                _ => {}
            }
        }
    }
}

/// Readings sit on a 0.1 bpm grid, so the change is compared in whole tenths.
fn moved_by_at_least(last: f32, bpm: f32, delta_bpm: f32) -> bool {
    let tenths = ((bpm - last).abs() * 10.0).round();
    tenths + DELTA_SLACK_TENTHS >= delta_bpm * 10.0
}

/// Runs a whole session to its deadline on the calling thread.
pub fn run<C, S, A, U>(
    config: SessionConfig,
    clock: &mut C,
    source: S,
    sink: A,
    uploader: U,
) -> Result<SessionSummary, ConfigError>
where
    C: Clock + ?Sized,
    S: SampleSource,
    A: ActuatorSink,
    U: Uploader,
{
    let mut session = Session::start(config, source, sink, uploader, clock.now_ms())?;
    while session.tick(clock.now_ms()) == Tick::Running {
        clock.relax();
    }
    Ok(session.finish(clock))
}
