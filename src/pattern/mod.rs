//! Recording patterns.
//!
//! A pattern decides when a camera records and for how long. Each variant
//! implements [`Pattern`], producing one [`Interval`] per call from its own
//! state plus random draws; [`PatternEngine`] pairs a pattern with its random
//! generator and exposes the result as an endless iterator. Nothing here
//! touches the clock or the filesystem.

mod continuous;
mod event;
mod motion;
mod random_slots;

pub use continuous::Continuous;
pub use event::EventTriggered;
pub use motion::MotionTriggered;
pub use random_slots::RandomOnOff;

use std::fmt;
use std::time::Duration;

use camsim_core::config::{positive_secs, CameraConfig, DurationRange, PatternConfig};
use camsim_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// One active-or-idle span of a camera's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub active: bool,
    pub duration: Duration,
}

impl Interval {
    pub fn active(duration: Duration) -> Self {
        Self {
            active: true,
            duration,
        }
    }

    pub fn idle(duration: Duration) -> Self {
        Self {
            active: false,
            duration,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.active { "record" } else { "idle" };
        write!(f, "{state} {:.1}s", self.duration.as_secs_f64())
    }
}

/// Produces the next interval of a timeline.
pub trait Pattern: Send + Sync {
    /// The `kind` tag this pattern was configured with.
    fn kind(&self) -> &'static str;

    /// Produce the next interval. Called forever; must never block.
    fn next_interval(&mut self, rng: &mut dyn RngCore) -> Interval;
}

/// Random source owned by one engine.
pub type PatternRng = Box<dyn RngCore + Send + Sync>;

/// Random generator for a camera: seeded when a seed is configured,
/// otherwise seeded from OS entropy.
pub fn camera_rng(seed: Option<u64>) -> PatternRng {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_entropy()),
    }
}

/// A pattern plus its random generator, iterated lazily.
///
/// The iterator never returns `None`. Restarting a timeline means building a
/// new engine.
pub struct PatternEngine {
    pattern: Box<dyn Pattern>,
    rng: PatternRng,
}

impl PatternEngine {
    pub fn new(pattern: Box<dyn Pattern>, rng: PatternRng) -> Self {
        Self { pattern, rng }
    }

    /// Build and validate the engine for `config`.
    ///
    /// `segment_max` is the camera's longest segment, used as the interval
    /// length of a continuous pattern without its own `segment_length`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for non-positive durations, inverted ranges, or
    /// probabilities outside their bounds.
    pub fn from_config(config: &PatternConfig, segment_max: Duration, rng: PatternRng) -> Result<Self> {
        let pattern: Box<dyn Pattern> = match config {
            PatternConfig::Continuous { segment_length } => {
                let length = match segment_length {
                    Some(secs) => positive_secs(*secs, "continuous.segment_length")?,
                    None => segment_max,
                };
                Box::new(Continuous::new(length)?)
            }
            PatternConfig::MotionTriggered { on_secs, off_secs } => Box::new(MotionTriggered::new(
                SpanRange::from_config(on_secs, "motion_triggered.on_secs")?,
                SpanRange::from_config(off_secs, "motion_triggered.off_secs")?,
            )),
            PatternConfig::EventTriggered {
                on_secs,
                off_secs,
                trigger_probability,
                max_suppressed,
            } => Box::new(EventTriggered::new(
                SpanRange::from_config(on_secs, "event_triggered.on_secs")?,
                SpanRange::from_config(off_secs, "event_triggered.off_secs")?,
                *trigger_probability,
                *max_suppressed,
            )?),
            PatternConfig::RandomOnOff {
                slot_secs,
                probability,
                max_coalesced_slots,
            } => Box::new(RandomOnOff::new(
                positive_secs(*slot_secs, "random_on_off.slot_secs")?,
                *probability,
                *max_coalesced_slots,
            )?),
        };
        Ok(Self::new(pattern, rng))
    }

    /// Build the engine for a camera, seeding from its configured seed.
    pub fn for_camera(camera: &CameraConfig) -> Result<Self> {
        let segment_max = camera.segment_duration_max()?;
        Self::from_config(&camera.pattern, segment_max, camera_rng(camera.seed))
            .map_err(|e| Error::Config(format!("camera '{}': {e}", camera.name)))
    }

    pub fn kind(&self) -> &'static str {
        self.pattern.kind()
    }

    /// Produce the next interval.
    pub fn next_interval(&mut self) -> Interval {
        self.pattern.next_interval(self.rng.as_mut())
    }
}

impl Iterator for PatternEngine {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        Some(self.next_interval())
    }
}

impl fmt::Debug for PatternEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternEngine")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// A validated, positive, non-inverted duration range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRange {
    pub min: Duration,
    pub max: Duration,
}

impl SpanRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min.is_zero() {
            return Err(Error::Config("range minimum must be positive".into()));
        }
        if min > max {
            return Err(Error::Config(format!(
                "range minimum {:.3}s exceeds maximum {:.3}s",
                min.as_secs_f64(),
                max.as_secs_f64()
            )));
        }
        Ok(Self { min, max })
    }

    fn from_config(range: &DurationRange, field: &str) -> Result<Self> {
        let min = positive_secs(range.min, &format!("{field}[0]"))?;
        let max = positive_secs(range.max, &format!("{field}[1]"))?;
        Self::new(min, max).map_err(|e| Error::Config(format!("{field}: {e}")))
    }

    /// Uniform draw within `[min, max]`.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn contains(&self, d: Duration) -> bool {
        (self.min..=self.max).contains(&d)
    }
}
