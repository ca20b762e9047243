//! Status reporting: periodic log lines while running, a summary at the end.

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::worker::{StatusHandle, WorkerState, WorkerStats, WorkerStatus};

/// A camera that never started.
#[derive(Debug)]
pub struct CameraFailure {
    pub camera: String,
    pub error: camsim_core::Error,
}

/// How one started camera ended.
#[derive(Debug, Clone)]
pub struct CameraSummary {
    pub camera: String,
    pub state: WorkerState,
    pub stats: WorkerStats,
    pub error: Option<String>,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct SimulationSummary {
    pub cameras: Vec<CameraSummary>,
    pub failed: Vec<CameraFailure>,
}

impl SimulationSummary {
    pub fn segments_written(&self) -> u64 {
        self.cameras.iter().map(|c| c.stats.segments_written).sum()
    }

    pub fn camera(&self, name: &str) -> Option<&CameraSummary> {
        self.cameras.iter().find(|c| c.camera == name)
    }

    /// The first started camera that stopped on an error.
    pub fn first_error(&self) -> Option<&CameraSummary> {
        self.cameras.iter().find(|c| c.error.is_some())
    }
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>8} {:>7} {:>8} {:>6} {:>12}",
            "CAMERA", "WRITTEN", "FAILED", "DROPPED", "DRIFT", "RECORDED"
        )?;
        for c in &self.cameras {
            writeln!(
                f,
                "{:<20} {:>8} {:>7} {:>8} {:>6} {:>12}",
                c.camera,
                c.stats.segments_written,
                c.stats.segments_failed,
                c.stats.segments_dropped,
                c.stats.drift_events,
                format_duration(c.stats.recorded),
            )?;
            if let Some(err) = &c.error {
                writeln!(f, "  error: {err}")?;
            }
        }
        for failure in &self.failed {
            writeln!(f, "{:<20} not started: {}", failure.camera, failure.error)?;
        }
        Ok(())
    }
}

/// `1h02m03s`, `4m05s`, `7s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

fn log_status(status: &WorkerStatus) {
    tracing::info!(
        camera = %status.camera,
        state = %status.state,
        written = status.stats.segments_written,
        failed = status.stats.segments_failed,
        dropped = status.stats.segments_dropped,
        recorded = %format_duration(status.stats.recorded),
        "Camera status"
    );
}

/// Log every camera's status each `interval` until cancelled or every
/// worker has stopped.
pub fn spawn_reporter(
    statuses: Vec<StatusHandle>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }

            let snapshots: Vec<WorkerStatus> = statuses.iter().map(StatusHandle::snapshot).collect();
            if snapshots.iter().all(|s| s.state == WorkerState::Stopped) {
                break;
            }
            snapshots.iter().for_each(log_status);
        }
    })
}
