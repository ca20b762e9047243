use rand::RngCore;

use super::{Interval, Pattern, SpanRange};

/// Alternating idle and recording spans, starting idle.
#[derive(Debug, Clone)]
pub struct MotionTriggered {
    on: SpanRange,
    off: SpanRange,
    next_active: bool,
}

impl MotionTriggered {
    pub fn new(on: SpanRange, off: SpanRange) -> Self {
        Self {
            on,
            off,
            next_active: false,
        }
    }
}

impl Pattern for MotionTriggered {
    fn kind(&self) -> &'static str {
        "motion_triggered"
    }

    fn next_interval(&mut self, rng: &mut dyn RngCore) -> Interval {
        let interval = if self.next_active {
            Interval::active(self.on.sample(rng))
        } else {
            Interval::idle(self.off.sample(rng))
        };
        self.next_active = !self.next_active;
        interval
    }
}
