use camsim_core::config::probability;
use camsim_core::{Error, Result};
use rand::{Rng, RngCore};

use super::{Interval, Pattern, SpanRange};

/// Sparse recordings: after every idle span an event fires with
/// `trigger_probability`; otherwise another idle span follows. After
/// `max_suppressed` consecutive misses the next event is forced.
#[derive(Debug, Clone)]
pub struct EventTriggered {
    on: SpanRange,
    off: SpanRange,
    trigger_probability: f64,
    max_suppressed: u32,
    last_was_idle: bool,
    suppressed: u32,
    forced: u64,
}

impl EventTriggered {
    pub fn new(on: SpanRange, off: SpanRange, trigger_probability: f64, max_suppressed: u32) -> Result<Self> {
        let p = probability(trigger_probability, "event_triggered.trigger_probability")?;
        if p == 0.0 {
            return Err(Error::Config(
                "event_triggered.trigger_probability must be greater than 0".into(),
            ));
        }
        Ok(Self {
            on,
            off,
            trigger_probability: p,
            max_suppressed,
            last_was_idle: false,
            suppressed: 0,
            forced: 0,
        })
    }

    /// How many events were forced by the suppression cap so far.
    pub fn forced_events(&self) -> u64 {
        self.forced
    }
}

impl Pattern for EventTriggered {
    fn kind(&self) -> &'static str {
        "event_triggered"
    }

    fn next_interval(&mut self, rng: &mut dyn RngCore) -> Interval {
        if !self.last_was_idle {
            self.last_was_idle = true;
            return Interval::idle(self.off.sample(rng));
        }

        let forced = self.suppressed >= self.max_suppressed;
        if forced || rng.gen_bool(self.trigger_probability) {
            if forced {
                self.forced += 1;
                tracing::trace!(suppressed = self.suppressed, "Forcing event after suppression cap");
            }
            self.suppressed = 0;
            self.last_was_idle = false;
            Interval::active(self.on.sample(rng))
        } else {
            self.suppressed += 1;
            Interval::idle(self.off.sample(rng))
        }
    }
}
