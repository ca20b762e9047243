use std::time::Duration;

use camsim_core::config::probability;
use camsim_core::{Error, Result};
use rand::{Rng, RngCore};

use super::{Interval, Pattern};

/// Fixed-size slots, each independently on with `probability`. Runs of equal
/// slots are merged into one interval, up to `max_coalesced_slots` slots.
#[derive(Debug, Clone)]
pub struct RandomOnOff {
    slot: Duration,
    probability: f64,
    max_coalesced_slots: u32,
    /// A slot already drawn that ended the previous run.
    pending: Option<bool>,
}

impl RandomOnOff {
    pub fn new(slot: Duration, on_probability: f64, max_coalesced_slots: u32) -> Result<Self> {
        if slot.is_zero() {
            return Err(Error::Config("random_on_off.slot_secs must be positive".into()));
        }
        if max_coalesced_slots == 0 {
            return Err(Error::Config(
                "random_on_off.max_coalesced_slots must be at least 1".into(),
            ));
        }
        // The longest interval this pattern can emit must be representable.
        if slot.checked_mul(max_coalesced_slots).is_none() {
            return Err(Error::Config(format!(
                "random_on_off.slot_secs ({:.0}s) times max_coalesced_slots ({max_coalesced_slots}) is too long",
                slot.as_secs_f64()
            )));
        }
        Ok(Self {
            slot,
            probability: probability(on_probability, "random_on_off.probability")?,
            max_coalesced_slots,
            pending: None,
        })
    }
}

impl Pattern for RandomOnOff {
    fn kind(&self) -> &'static str {
        "random_on_off"
    }

    fn next_interval(&mut self, rng: &mut dyn RngCore) -> Interval {
        let p = self.probability;
        let active = self.pending.take().unwrap_or_else(|| rng.gen_bool(p));

        let mut slots = 1;
        while slots < self.max_coalesced_slots {
            let next = rng.gen_bool(p);
            if next != active {
                self.pending = Some(next);
                break;
            }
            slots += 1;
        }

        Interval {
            active,
            duration: self.slot * slots,
        }
    }
}
