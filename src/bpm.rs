use serde::Serialize;

use crate::time::ticks_diff;

/// Current heart rate as seen by a consumer at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HeartRate {
    Present { bpm: f32 },
    /// A value exists but is older than the staleness bound.
    Stale { bpm: f32, age_ms: u32 },
    /// Nothing has been computed this session.
    Absent,
}

impl HeartRate {
    pub fn bpm(&self) -> Option<f32> {
        match self {
            HeartRate::Present { bpm } => Some(*bpm),
            _ => None,
        }
    }
}

/// What happened to one RR interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RrOutcome {
    Accumulated { count: u32 },
    Computed { bpm: f32 },
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Computation {
    bpm: f32,
    at: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatorLimits {
    pub rr_min_ms: u32,
    pub rr_max_ms: u32,
    pub beats_per_average: u32,
    pub staleness_ms: u32,
}

/// Block average over `beats_per_average` consecutive plausible RR intervals.
pub struct HeartRateAggregator {
    limits: AggregatorLimits,
    count: u32,
    total_ms: u64,
    last: Option<Computation>,
}

impl HeartRateAggregator {
    pub fn new(limits: AggregatorLimits) -> Self {
        Self {
            limits,
            count: 0,
            total_ms: 0,
            last: None,
        }
    }

    pub fn accept(&mut self, rr_ms: u32, now: u32) -> RrOutcome {
        if !self.is_plausible(rr_ms) {
            log::warn!(
                "Skipping RR {} ms - outside {}..={} ms, restarting average ({} interval(s) discarded)",
                rr_ms,
                self.limits.rr_min_ms,
                self.limits.rr_max_ms,
                self.count
            );
            self.reset();
            return RrOutcome::Rejected;
        }

        self.total_ms += u64::from(rr_ms);
        self.count += 1;

        if self.count < self.limits.beats_per_average {
            log::debug!(
                "Accepted RR {} ms ({}/{})",
                rr_ms,
                self.count,
                self.limits.beats_per_average
            );
            return RrOutcome::Accumulated { count: self.count };
        }

        let bpm = block_average_bpm(self.count, self.total_ms);
        log::debug!(
            "Heart rate {} BPM from {} intervals over {} ms",
            bpm,
            self.count,
            self.total_ms
        );
        self.last = Some(Computation { bpm, at: now });
        self.reset();
        RrOutcome::Computed { bpm }
    }

    pub fn reading(&self, now: u32) -> HeartRate {
        match self.last {
            None => HeartRate::Absent,
            Some(Computation { bpm, at }) => {
                let age = ticks_diff(now, at).max(0) as u32;
                if age < self.limits.staleness_ms {
                    HeartRate::Present { bpm }
                } else {
                    HeartRate::Stale { bpm, age_ms: age }
                }
            }
        }
    }

    #[cfg(test)]
    fn pending_intervals(&self) -> u32 {
        self.count
    }

    fn is_plausible(&self, rr_ms: u32) -> bool {
        (self.limits.rr_min_ms..=self.limits.rr_max_ms).contains(&rr_ms)
    }

    fn reset(&mut self) {
        self.count = 0;
        self.total_ms = 0;
    }
}

/// `beats / minutes`, rounded to one decimal.
pub fn block_average_bpm(beats: u32, total_ms: u64) -> f32 {
    let minutes = total_ms as f64 / 1000.0 / 60.0;
    round_to_tenth(f64::from(beats) / minutes) as f32
}

/// Rounds the exact binary value of `x >= 0` to one decimal, ties to even.
fn round_to_tenth(x: f64) -> f64 {
    let lower = (x * 10.0).floor();
    // x against the midpoint (lower + 0.5) / 10, both scaled by 20
    let midpoint = 2.0 * lower + 1.0;
    let scaled = x * 20.0;
    let side = if scaled != midpoint {
        scaled - midpoint
    } else {
        x.mul_add(20.0, -scaled)
    };
    let tenths = if side < 0.0 {
        lower
    } else if side > 0.0 || lower.rem_euclid(2.0) == 1.0 {
        lower + 1.0
    } else {
        lower
    };
    tenths / 10.0
}
