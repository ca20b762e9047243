//! Per-camera recording loop.
//!
//! A [`CameraWorker`] pulls intervals from its pattern, sleeps through idle
//! ones, and turns active ones into paced segments: source ranges from its
//! cursor, a file name from its namer, and an encode through the shared
//! synthesizer. It runs until cancelled or until its clock passes the
//! configured run horizon.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camsim_core::config::{CameraConfig, DriftPolicy, SimulatorConfig};
use camsim_core::{Error, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::cursor::SourceCursor;
use crate::naming::SegmentNamer;
use crate::pattern::PatternEngine;
use crate::retention;
use crate::synth::SegmentSynthesizer;

/// Lateness below this is scheduling noise, not drift.
const DRIFT_TOLERANCE: Duration = Duration::from_secs(1);

/// Lifecycle of a camera worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Recording,
    Stopping,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Idle => "idle",
            WorkerState::Recording => "recording",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Counters accumulated over a worker's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub segments_written: u64,
    pub segments_failed: u64,
    /// Segments skipped to resynchronize with the clock.
    pub segments_dropped: u64,
    pub drift_events: u64,
    /// Nominal duration of all written segments.
    pub recorded: Duration,
    pub last_segment: Option<PathBuf>,
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub camera: String,
    pub state: WorkerState,
    pub stats: WorkerStats,
}

/// Shared, cheaply cloneable handle to a worker's live status.
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<Mutex<WorkerStatus>>);

impl StatusHandle {
    fn new(camera: &str) -> Self {
        Self(Arc::new(Mutex::new(WorkerStatus {
            camera: camera.to_string(),
            state: WorkerState::Idle,
            stats: WorkerStats::default(),
        })))
    }

    pub fn snapshot(&self) -> WorkerStatus {
        self.0.lock().clone()
    }

    pub fn state(&self) -> WorkerState {
        self.0.lock().state
    }

    /// Flag a pending stop. No effect once the worker has stopped.
    pub fn mark_stopping(&self) {
        let mut status = self.0.lock();
        if status.state != WorkerState::Stopped {
            status.state = WorkerState::Stopping;
        }
    }

    fn set_state(&self, state: WorkerState) {
        let mut status = self.0.lock();
        // Stopping is sticky until the worker actually stops.
        if status.state == WorkerState::Stopping && state != WorkerState::Stopped {
            return;
        }
        status.state = state;
    }

    fn update(&self, f: impl FnOnce(&mut WorkerStats)) {
        f(&mut self.0.lock().stats);
    }
}

/// Per-camera knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub segment_max: Duration,
    pub drift_policy: DriftPolicy,
    pub extension: String,
    /// Segments to keep on disk; `None` disables pruning.
    pub retention: Option<usize>,
    /// Stop once the clock has advanced this far past the start.
    pub run_for: Option<Duration>,
}

impl WorkerSettings {
    pub fn from_config(camera: &CameraConfig, simulator: &SimulatorConfig) -> Result<Self> {
        Ok(Self {
            segment_max: camera.segment_duration_max()?,
            drift_policy: simulator.drift_policy,
            extension: simulator.extension().to_string(),
            retention: simulator
                .retention
                .enabled
                .then_some(simulator.retention.count),
            run_for: simulator.run_duration(),
        })
    }
}

/// Drives one camera from pattern to files.
pub struct CameraWorker {
    camera: String,
    source: PathBuf,
    engine: PatternEngine,
    cursor: SourceCursor,
    namer: SegmentNamer,
    synth: SegmentSynthesizer,
    clock: Arc<dyn Clock>,
    settings: WorkerSettings,
    status: StatusHandle,
    deadline: Option<DateTime<Local>>,
}

impl CameraWorker {
    /// Build a worker for `camera` whose source is `source_duration` long.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for invalid pattern parameters and
    /// [`Error::UnusableSource`] for a zero-length source.
    pub fn new(
        camera: &CameraConfig,
        source_duration: Duration,
        settings: WorkerSettings,
        synth: SegmentSynthesizer,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let engine = PatternEngine::for_camera(camera)?;
        let cursor = SourceCursor::new(&camera.source_video, source_duration)?;
        let namer = SegmentNamer::new(&camera.name, camera.output_folder(), &settings.extension);
        Ok(Self {
            camera: camera.name.clone(),
            source: camera.source_video.clone(),
            engine,
            cursor,
            namer,
            synth,
            clock,
            status: StatusHandle::new(&camera.name),
            settings,
            deadline: None,
        })
    }

    /// Replace the pattern engine, e.g. with one on an injected generator.
    pub fn with_engine(mut self, engine: PatternEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn name(&self) -> &str {
        &self.camera
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Run until `cancel` fires or the run horizon passes.
    ///
    /// Cancellation is observed at interval boundaries and before each
    /// segment; a segment already being synthesized is completed first.
    ///
    /// # Errors
    ///
    /// Only contract violations ([`Error::InvalidRequest`]) and I/O failures
    /// outside synthesis end the worker early. Failed segments are logged
    /// and skipped.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<WorkerStats> {
        let started = self.clock.now();
        self.deadline = self.settings.run_for.map(|d| later(started, d));

        tracing::info!(
            camera = %self.camera,
            pattern = self.engine.kind(),
            source = %self.source.display(),
            source_secs = self.cursor.source_duration().as_secs_f64(),
            folder = %self.namer.folder().display(),
            "Camera started"
        );

        let result = self.record(&cancel).await;
        self.status.set_state(WorkerState::Stopped);

        let stats = self.status.snapshot().stats;
        match &result {
            Ok(()) => tracing::info!(
                camera = %self.camera,
                written = stats.segments_written,
                failed = stats.segments_failed,
                "Camera stopped"
            ),
            Err(e) => tracing::error!(camera = %self.camera, "Camera stopped on error: {e}"),
        }
        result.map(|()| stats)
    }

    async fn record(&mut self, cancel: &CancellationToken) -> Result<()> {
        // Earliest instant the next interval may begin.
        let mut next_start = self.clock.now();

        loop {
            if self.should_stop(cancel) {
                break;
            }

            let interval = self.engine.next_interval();
            tracing::debug!(camera = %self.camera, "Next interval: {interval}");

            if !interval.active {
                self.status.set_state(WorkerState::Idle);
                let idle_start = match self.settings.drift_policy {
                    DriftPolicy::Drift => next_start.max(self.clock.now()),
                    // Idle time absorbs lag.
                    DriftPolicy::Resync => next_start,
                };
                next_start = later(idle_start, interval.duration);
                if !self.pause_until(next_start, cancel).await {
                    break;
                }
                continue;
            }

            let mut remaining = interval.duration;
            while !remaining.is_zero() {
                let length = remaining.min(self.settings.segment_max);

                if !self.pause_until(next_start, cancel).await {
                    self.stop_requested();
                    return Ok(());
                }

                let now = self.clock.now();
                let lag = (now - next_start).to_std().unwrap_or(Duration::ZERO);

                if self.settings.drift_policy == DriftPolicy::Resync && lag >= length {
                    // Fell a whole segment behind: skip its footage too.
                    self.cursor.advance(length)?;
                    self.status.update(|s| s.segments_dropped += 1);
                    tracing::warn!(
                        camera = %self.camera,
                        lag_secs = lag.as_secs_f64(),
                        "Dropped segment to resynchronize"
                    );
                    next_start = later(next_start, length);
                    remaining -= length;
                    continue;
                }

                if lag > DRIFT_TOLERANCE {
                    self.status.update(|s| s.drift_events += 1);
                    tracing::warn!(
                        camera = %self.camera,
                        lag_secs = lag.as_secs_f64(),
                        "Segment starting late"
                    );
                }

                self.status.set_state(WorkerState::Recording);
                let written = self.write_segment(now, length).await?;

                next_start = match self.settings.drift_policy {
                    DriftPolicy::Drift => later(now, length),
                    DriftPolicy::Resync => later(next_start, length),
                };
                remaining -= length;

                if !written {
                    // Give up the rest of this interval; the timeline keeps its shape.
                    next_start = later(next_start, remaining);
                    break;
                }
            }
        }

        self.stop_requested();
        Ok(())
    }

    /// Synthesize one segment starting at `start`. Returns whether a file
    /// was written.
    async fn write_segment(&mut self, start: DateTime<Local>, length: Duration) -> Result<bool> {
        let ranges = self.cursor.advance(length)?;
        let output = self.namer.next_path(start);

        tracing::debug!(
            camera = %self.camera,
            output = %output.display(),
            ranges = ranges.len(),
            length_secs = length.as_secs_f64(),
            "Synthesizing segment"
        );

        match self
            .synth
            .synthesize(&self.source, &ranges, &output, start)
            .await
        {
            Ok(report) => {
                tracing::info!(
                    camera = %self.camera,
                    file = %report.path.display(),
                    length_secs = length.as_secs_f64(),
                    attempts = report.attempts,
                    "Segment written"
                );
                self.status.update(|s| {
                    s.segments_written += 1;
                    s.recorded += length;
                    s.last_segment = Some(report.path.clone());
                });
                self.prune().await;
                Ok(true)
            }
            Err(Error::SynthesisFailed { attempts, message }) => {
                tracing::warn!(
                    camera = %self.camera,
                    output = %output.display(),
                    attempts,
                    "Skipping segment: {message}"
                );
                self.status.update(|s| s.segments_failed += 1);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn prune(&self) {
        let Some(keep) = self.settings.retention else {
            return;
        };
        let namer = self.namer.clone();
        match tokio::task::spawn_blocking(move || retention::prune(&namer, keep)).await {
            Ok(Ok(removed)) if !removed.is_empty() => {
                tracing::debug!(camera = %self.camera, removed = removed.len(), "Pruned old segments");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(camera = %self.camera, "Retention cleanup failed: {e}"),
            Err(e) => tracing::warn!(camera = %self.camera, "Retention task failed: {e}"),
        }
    }

    /// Sleep until `target` (or the horizon, if sooner). Returns `false` if
    /// the worker should stop.
    async fn pause_until(&self, target: DateTime<Local>, cancel: &CancellationToken) -> bool {
        let target = match self.deadline {
            Some(deadline) => target.min(deadline),
            None => target,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.clock.sleep_until(target) => !self.past_deadline(),
        }
    }

    fn should_stop(&self, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || self.past_deadline()
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| self.clock.now() >= d)
    }

    fn stop_requested(&self) {
        self.status.mark_stopping();
    }
}

fn later(t: DateTime<Local>, d: Duration) -> DateTime<Local> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(t)
}
