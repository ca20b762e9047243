//! Time sources.
//!
//! Workers never call `Local::now()` or `tokio::time::sleep` directly; they
//! go through a [`Clock`] so the same scheduling code can follow the wall
//! clock, a shifted wall clock, or a virtual timeline that advances as fast
//! as the encoder allows.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// Supplies "now" and a sleep-until-instant primitive.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Resolve once `now() >= deadline`. Returns immediately for past
    /// deadlines.
    async fn sleep_until(&self, deadline: DateTime<Local>);
}

/// The host's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Local>) {
        if let Ok(wait) = (deadline - Local::now()).to_std() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Real-time pacing with timestamps shifted to start at `origin`.
#[derive(Debug, Clone)]
pub struct OffsetClock {
    origin: DateTime<Local>,
    started: tokio::time::Instant,
}

impl OffsetClock {
    pub fn new(origin: DateTime<Local>) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for OffsetClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }

    async fn sleep_until(&self, deadline: DateTime<Local>) {
        if let Ok(wait) = (deadline - self.now()).to_std() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Virtual time: sleeping moves the clock forward instead of waiting.
///
/// Used for accelerated runs and deterministic tests.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<DateTime<Local>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `d`, e.g. to model a slow encoder.
    pub fn advance(&self, d: std::time::Duration) {
        let d = chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
        *self.now.lock() += d;
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }

    async fn sleep_until(&self, deadline: DateTime<Local>) {
        {
            let mut now = self.now.lock();
            if deadline > *now {
                *now = deadline;
            }
        }
        // Let sibling tasks and cancellation observe the new time.
        tokio::task::yield_now().await;
    }
}

/// How each camera obtains its clock.
#[derive(Clone)]
pub enum ClockMode {
    /// Wall clock, optionally shifted so the run appears to start at `start`.
    Realtime { start: Option<DateTime<Local>> },
    /// An independent [`SimulatedClock`] per camera, starting at `start`.
    Accelerated { start: DateTime<Local> },
    /// One injected clock shared by every camera.
    Shared(Arc<dyn Clock>),
}

impl ClockMode {
    /// Build the clock for one camera.
    pub fn clock_for_camera(&self) -> Arc<dyn Clock> {
        match self {
            ClockMode::Realtime { start: None } => Arc::new(SystemClock),
            ClockMode::Realtime { start: Some(start) } => Arc::new(OffsetClock::new(*start)),
            ClockMode::Accelerated { start } => Arc::new(SimulatedClock::new(*start)),
            ClockMode::Shared(clock) => clock.clone(),
        }
    }
}

impl std::fmt::Debug for ClockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockMode::Realtime { start } => f.debug_struct("Realtime").field("start", start).finish(),
            ClockMode::Accelerated { start } => {
                f.debug_struct("Accelerated").field("start", start).finish()
            }
            ClockMode::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}
