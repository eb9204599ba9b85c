use crate::time::Deadline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    Led,
    Buzzer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Digital outputs. Writes must not block.
pub trait ActuatorSink {
    fn set(&mut self, pin: Pin, level: Level);
}

impl<A: ActuatorSink + ?Sized> ActuatorSink for &mut A {
    fn set(&mut self, pin: Pin, level: Level) {
        (**self).set(pin, level)
    }
}

/// Host sink: remembers levels and traces every change.
#[derive(Debug, Default)]
pub struct LogPins {
    led: Option<Level>,
    buzzer: Option<Level>,
}

impl LogPins {
    pub fn level(&self, pin: Pin) -> Option<Level> {
        match pin {
            Pin::Led => self.led,
            Pin::Buzzer => self.buzzer,
        }
    }
}

impl ActuatorSink for LogPins {
    fn set(&mut self, pin: Pin, level: Level) {
        let slot = match pin {
            Pin::Led => &mut self.led,
            Pin::Buzzer => &mut self.buzzer,
        };
        if *slot != Some(level) {
            log::trace!("{:?} -> {:?}", pin, level);
        }
        *slot = Some(level);
    }
}

#[derive(Debug, Clone)]
pub struct LedBlinker {
    interval_ms: u32,
    next_toggle: Deadline,
    lit: bool,
}

impl LedBlinker {
    /// First toggle happens at `now`.
    pub fn new(interval_ms: u32, now: u32) -> Self {
        Self {
            interval_ms,
            next_toggle: Deadline::at(now),
            lit: false,
        }
    }

    /// Returns the new state if the LED toggled.
    pub fn step(&mut self, now: u32) -> Option<bool> {
        if !self.next_toggle.due(now) {
            return None;
        }
        self.lit = !self.lit;
        self.next_toggle.arm(now, self.interval_ms);
        Some(self.lit)
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    fn force_off(&mut self) {
        self.lit = false;
        self.next_toggle.clear();
    }
}

#[derive(Debug, Clone)]
pub struct BuzzerPulse {
    deadline: Deadline,
}

impl BuzzerPulse {
    pub fn new() -> Self {
        Self {
            deadline: Deadline::new(),
        }
    }

    pub fn arm(&mut self, now: u32, duration_ms: u32) {
        self.deadline.arm(now, duration_ms);
    }

    /// True exactly once, on the tick the pulse runs out.
    pub fn expire(&mut self, now: u32) -> bool {
        if self.deadline.due(now) {
            self.deadline.clear();
            true
        } else {
            false
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.deadline.is_armed()
    }

    fn cancel(&mut self) {
        self.deadline.clear();
    }
}

impl Default for BuzzerPulse {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Actuators<S: ActuatorSink> {
    sink: S,
    led: LedBlinker,
    buzzer: BuzzerPulse,
    buzzer_active_high: bool,
}

impl<S: ActuatorSink> Actuators<S> {
    pub fn new(mut sink: S, led_interval_ms: u32, buzzer_active_high: bool, now: u32) -> Self {
        sink.set(Pin::Led, Level::Low);
        sink.set(Pin::Buzzer, Level::from_bool(!buzzer_active_high));
        Self {
            sink,
            led: LedBlinker::new(led_interval_ms, now),
            buzzer: BuzzerPulse::new(),
            buzzer_active_high,
        }
    }

    pub fn step_led(&mut self, now: u32) {
        if let Some(lit) = self.led.step(now) {
            self.sink.set(Pin::Led, Level::from_bool(lit));
        }
    }

    /// Starts (or restarts) a buzzer pulse ending at `now + duration_ms`.
    pub fn beep(&mut self, now: u32, duration_ms: u32) {
        self.buzzer.arm(now, duration_ms);
        self.drive_buzzer(true);
    }

    pub fn expire_buzzer(&mut self, now: u32) {
        if self.buzzer.expire(now) {
            self.drive_buzzer(false);
        }
    }

    pub fn buzzer_sounding(&self) -> bool {
        self.buzzer.is_sounding()
    }

    pub fn led_lit(&self) -> bool {
        self.led.is_lit()
    }

    /// LED off, buzzer off, timers cleared.
    pub fn quiesce(&mut self) {
        self.led.force_off();
        self.buzzer.cancel();
        self.sink.set(Pin::Led, Level::Low);
        self.drive_buzzer(false);
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn drive_buzzer(&mut self, on: bool) {
        let level = Level::from_bool(on == self.buzzer_active_high);
        self.sink.set(Pin::Buzzer, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(Pin, Level)>,
    }

    impl ActuatorSink for Recorder {
        fn set(&mut self, pin: Pin, level: Level) {
            self.writes.push((pin, level));
        }
    }

    impl Recorder {
        fn last(&self, pin: Pin) -> Option<Level> {
            self.writes.iter().rev().find(|(p, _)| *p == pin).map(|(_, l)| *l)
        }
    }

    #[test]
    fn led_step_before_deadline_is_noop() {
        let mut led = LedBlinker::new(200, 0);
        assert_eq!(led.step(0), Some(true));
        let before = led.clone();
        assert_eq!(led.step(199), None);
        assert_eq!(led.is_lit(), before.is_lit());
        assert_eq!(led.next_toggle, before.next_toggle);
        assert_eq!(led.step(200), Some(false));
    }

    #[test]
    fn led_pin_untouched_between_toggles() {
        let mut act = Actuators::new(Recorder::default(), 200, true, 0);
        act.step_led(0);
        let writes = act.sink().writes.len();
        for t in 1..200 {
            act.step_led(t);
        }
        assert_eq!(act.sink().writes.len(), writes);
        assert_eq!(act.sink().last(Pin::Led), Some(Level::High));
    }

    #[test]
    fn buzzer_pulse_window() {
        let mut act = Actuators::new(Recorder::default(), 200, true, 0);
        act.beep(1000, 60);
        for t in 1000..1060 {
            act.step_led(t);
            act.expire_buzzer(t);
            assert!(act.buzzer_sounding(), "off early at {t}");
            assert_eq!(act.sink().last(Pin::Buzzer), Some(Level::High));
        }
        act.expire_buzzer(1060);
        assert!(!act.buzzer_sounding());
        assert_eq!(act.sink().last(Pin::Buzzer), Some(Level::Low));
    }

    #[test]
    fn active_low_buzzer_inverts_levels() {
        let mut act = Actuators::new(Recorder::default(), 200, false, 0);
        assert_eq!(act.sink().last(Pin::Buzzer), Some(Level::High));
        act.beep(0, 10);
        assert_eq!(act.sink().last(Pin::Buzzer), Some(Level::Low));
        act.expire_buzzer(10);
        assert_eq!(act.sink().last(Pin::Buzzer), Some(Level::High));
    }

    #[test]
    fn rearm_extends_pulse() {
        let mut pulse = BuzzerPulse::new();
        pulse.arm(0, 500);
        pulse.arm(450, 60);
        assert!(!pulse.expire(500));
        assert!(pulse.expire(510));
        assert!(!pulse.expire(600));
    }

    #[test]
    fn quiesce_turns_everything_off() {
        let mut pins = LogPins::default();
        pins.set(Pin::Led, Level::High);
        let mut act = Actuators::new(pins, 200, true, 0);
        act.step_led(0);
        act.beep(0, 500);
        act.quiesce();
        assert!(!act.led_lit());
        assert!(!act.buzzer_sounding());
        assert_eq!(act.sink().level(Pin::Led), Some(Level::Low));
        assert_eq!(act.sink().level(Pin::Buzzer), Some(Level::Low));
        act.step_led(10_000);
        assert_eq!(act.sink().level(Pin::Led), Some(Level::Low));
    }
}
