use clap::{Args, ValueEnum};
use thiserror::Error;

pub const DEFAULT_SAMPLE_PERIOD_MS: u32 = 10;
pub const DEFAULT_LED_BLINK_MS: u32 = 200;
pub const DEFAULT_TONE_MS: u32 = 500;
pub const DEFAULT_REPORT_INTERVAL_MS: u32 = 3000;
pub const DEFAULT_BEEP_MS: u32 = 60;
pub const DEFAULT_DRIFT_ALPHA: f32 = 0.995;
pub const DEFAULT_ENVELOPE_ALPHA: f32 = 0.95;
pub const DEFAULT_NOISE_OFFSET: f32 = 2.0;
pub const DEFAULT_REFRACTORY_MS: u32 = 250;
pub const DEFAULT_RR_MIN_MS: u32 = 270;
pub const DEFAULT_RR_MAX_MS: u32 = 2000;
pub const DEFAULT_BEATS_PER_AVERAGE: u32 = 3;
pub const DEFAULT_STALENESS_MS: u32 = 8000;
pub const DEFAULT_SESSION_MS: u32 = 30_000;
pub const DEFAULT_UPLOAD_DELTA_BPM: f32 = 0.1;

/// Longest duration that keeps signed tick differences unambiguous.
const MAX_DURATION_MS: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Log,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceMode {
    Synthetic,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClockMode {
    Realtime,
    Simulated,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be finite and strictly between 0 and 1, got {value}")]
    Alpha { name: &'static str, value: f32 },
    #[error("noise offset must be finite, got {0}")]
    NoiseOffset(f32),
    #[error("RR bounds must satisfy min < max, got {min}..{max} ms")]
    RrBounds { min: u32, max: u32 },
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("{name} of {value} ms does not fit the signed tick range")]
    TooLong { name: &'static str, value: u32 },
    #[error("{beats} intervals of up to {rr_max_ms} ms do not fit the signed tick range")]
    AverageWindow { beats: u32, rr_max_ms: u32 },
    #[error("upload delta must be finite and non-negative, got {0}")]
    UploadDelta(f32),
    #[error("patient identifier must not be empty")]
    PatientId,
}

/// Everything fixed for the lifetime of one measurement session.
#[derive(Debug, Clone, Args)]
pub struct SessionConfig {
    /// Identifier attached to every upload
    #[arg(long, default_value = "local")]
    pub patient_id: String,

    /// Total measurement time
    #[arg(long, default_value_t = DEFAULT_SESSION_MS)]
    pub session_ms: u32,

    /// ADC sampling period
    #[arg(long, default_value_t = DEFAULT_SAMPLE_PERIOD_MS)]
    pub sample_period_ms: u32,

    #[arg(long, default_value_t = DEFAULT_LED_BLINK_MS)]
    pub led_blink_ms: u32,

    /// Start and end tone length
    #[arg(long, default_value_t = DEFAULT_TONE_MS)]
    pub tone_ms: u32,

    /// Click the buzzer on every detected beat
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub beep_on_beat: bool,

    #[arg(long, default_value_t = DEFAULT_BEEP_MS)]
    pub beep_ms: u32,

    /// Buzzer sounds when its pin is driven high
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub buzzer_active_high: bool,

    /// Status, summary and upload cadence
    #[arg(long, default_value_t = DEFAULT_REPORT_INTERVAL_MS)]
    pub report_interval_ms: u32,

    /// Baseline tracker coefficient; larger follows drift more slowly
    #[arg(long, default_value_t = DEFAULT_DRIFT_ALPHA)]
    pub drift_alpha: f32,

    /// Envelope tracker coefficient
    #[arg(long, default_value_t = DEFAULT_ENVELOPE_ALPHA)]
    pub envelope_alpha: f32,

    /// Added to the envelope to form the trigger level
    #[arg(long, default_value_t = DEFAULT_NOISE_OFFSET)]
    pub noise_offset: f32,

    #[arg(long, default_value_t = DEFAULT_REFRACTORY_MS)]
    pub refractory_ms: u32,

    #[arg(long, default_value_t = DEFAULT_RR_MIN_MS)]
    pub rr_min_ms: u32,

    #[arg(long, default_value_t = DEFAULT_RR_MAX_MS)]
    pub rr_max_ms: u32,

    /// Intervals per block average
    #[arg(long, default_value_t = DEFAULT_BEATS_PER_AVERAGE)]
    pub beats_per_average: u32,

    /// Age after which a heart rate is no longer reported
    #[arg(long, default_value_t = DEFAULT_STALENESS_MS)]
    pub staleness_ms: u32,

    /// Minimum change before the same reading is uploaded again
    #[arg(long, default_value_t = DEFAULT_UPLOAD_DELTA_BPM)]
    pub upload_delta_bpm: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            patient_id: "local".to_string(),
            session_ms: DEFAULT_SESSION_MS,
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            led_blink_ms: DEFAULT_LED_BLINK_MS,
            tone_ms: DEFAULT_TONE_MS,
            beep_on_beat: true,
            beep_ms: DEFAULT_BEEP_MS,
            buzzer_active_high: true,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            drift_alpha: DEFAULT_DRIFT_ALPHA,
            envelope_alpha: DEFAULT_ENVELOPE_ALPHA,
            noise_offset: DEFAULT_NOISE_OFFSET,
            refractory_ms: DEFAULT_REFRACTORY_MS,
            rr_min_ms: DEFAULT_RR_MIN_MS,
            rr_max_ms: DEFAULT_RR_MAX_MS,
            beats_per_average: DEFAULT_BEATS_PER_AVERAGE,
            staleness_ms: DEFAULT_STALENESS_MS,
            upload_delta_bpm: DEFAULT_UPLOAD_DELTA_BPM,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_alpha("drift alpha", self.drift_alpha)?;
        check_alpha("envelope alpha", self.envelope_alpha)?;

        if !self.noise_offset.is_finite() {
            return Err(ConfigError::NoiseOffset(self.noise_offset));
        }
        if self.rr_min_ms >= self.rr_max_ms {
            return Err(ConfigError::RrBounds {
                min: self.rr_min_ms,
                max: self.rr_max_ms,
            });
        }
        if self.beats_per_average == 0 {
            return Err(ConfigError::Zero("beats per average"));
        }

        for (name, value) in [
            ("session duration", self.session_ms),
            ("sample period", self.sample_period_ms),
            ("LED blink interval", self.led_blink_ms),
            ("report interval", self.report_interval_ms),
            ("staleness bound", self.staleness_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        for (name, value) in [
            ("session duration", self.session_ms),
            ("sample period", self.sample_period_ms),
            ("LED blink interval", self.led_blink_ms),
            ("report interval", self.report_interval_ms),
            ("staleness bound", self.staleness_ms),
            ("tone", self.tone_ms),
            ("beep", self.beep_ms),
            ("refractory period", self.refractory_ms),
            ("RR upper bound", self.rr_max_ms),
        ] {
            if value > MAX_DURATION_MS {
                return Err(ConfigError::TooLong { name, value });
            }
        }
        if u64::from(self.rr_max_ms) * u64::from(self.beats_per_average)
            > u64::from(MAX_DURATION_MS)
        {
            return Err(ConfigError::AverageWindow {
                beats: self.beats_per_average,
                rr_max_ms: self.rr_max_ms,
            });
        }

        if !self.upload_delta_bpm.is_finite() || self.upload_delta_bpm < 0.0 {
            return Err(ConfigError::UploadDelta(self.upload_delta_bpm));
        }
        if self.patient_id.trim().is_empty() {
            return Err(ConfigError::PatientId);
        }
        Ok(())
    }
}

fn check_alpha(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Alpha { name, value })
    }
}
