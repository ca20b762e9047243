use std::time::Duration;

use camsim_core::{Error, Result};
use rand::RngCore;

use super::{Interval, Pattern};

/// Always recording: an endless run of equal active intervals.
#[derive(Debug, Clone)]
pub struct Continuous {
    length: Duration,
}

impl Continuous {
    pub fn new(length: Duration) -> Result<Self> {
        if length.is_zero() {
            return Err(Error::Config("continuous segment length must be positive".into()));
        }
        Ok(Self { length })
    }
}

impl Pattern for Continuous {
    fn kind(&self) -> &'static str {
        "continuous"
    }

    fn next_interval(&mut self, _rng: &mut dyn RngCore) -> Interval {
        Interval::active(self.length)
    }
}
