//! Starts and stops the camera fleet.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use camsim_av::probe::check_source_file;
use camsim_av::DurationProbe;
use camsim_core::config::{CameraConfig, SimulatorConfig};
use camsim_core::{Encoder, Error, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::ClockMode;
use crate::pattern::PatternEngine;
use crate::status::{self, CameraFailure, CameraSummary, SimulationSummary};
use crate::synth::{RetryPolicy, SegmentSynthesizer};
use crate::worker::{CameraWorker, StatusHandle, WorkerSettings, WorkerStats, WorkerStatus};

/// Collaborators shared by every camera of a run.
#[derive(Clone)]
pub struct SimulationContext {
    pub simulator: SimulatorConfig,
    pub encoder: Arc<dyn Encoder>,
    pub probe: Arc<dyn DurationProbe>,
    pub clock: ClockMode,
}

#[derive(Debug)]
struct RunningCamera {
    name: String,
    status: StatusHandle,
    task: JoinHandle<Result<WorkerStats>>,
}

/// Broadcasts a stop to every worker of a run. Cloneable so a signal
/// handler can hold one while the caller waits on the handle.
#[derive(Debug, Clone)]
pub struct Stopper {
    cancel: CancellationToken,
    statuses: Vec<StatusHandle>,
}

impl Stopper {
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::info!("Stopping {} camera(s)", self.statuses.len());
        for status in &self.statuses {
            status.mark_stopping();
        }
        self.cancel.cancel();
    }
}

/// A running simulation.
#[derive(Debug)]
pub struct SimulationHandle {
    stopper: Stopper,
    cameras: Vec<RunningCamera>,
    failed: Vec<CameraFailure>,
    reporter: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Cameras that could not start, with the reason.
    pub fn failed(&self) -> &[CameraFailure] {
        &self.failed
    }

    /// Names of the cameras that started.
    pub fn running(&self) -> Vec<&str> {
        self.cameras.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn statuses(&self) -> Vec<WorkerStatus> {
        self.cameras.iter().map(|c| c.status.snapshot()).collect()
    }

    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// Broadcast cancellation and wait until every worker has stopped.
    pub async fn stop(self) -> SimulationSummary {
        self.stopper.stop();
        self.wait().await
    }

    /// Wait for every worker to finish on its own (run horizon reached or
    /// stopped through a [`Stopper`]).
    pub async fn wait(self) -> SimulationSummary {
        let mut summary = SimulationSummary {
            cameras: Vec::with_capacity(self.cameras.len()),
            failed: self.failed,
        };

        for camera in self.cameras {
            let error = match camera.task.await {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => {
                    tracing::error!(camera = %camera.name, "Camera task panicked: {e}");
                    Some(format!("worker task failed: {e}"))
                }
            };
            let snapshot = camera.status.snapshot();
            summary.cameras.push(CameraSummary {
                camera: camera.name,
                state: snapshot.state,
                stats: snapshot.stats,
                error,
            });
        }

        // Workers are done; let the reporter go.
        self.stopper.cancel.cancel();
        if let Some(reporter) = self.reporter {
            let _ = reporter.await;
        }
        summary
    }
}

/// Reject configurations no camera should start with: duplicate or empty
/// names and invalid pattern parameters.
pub fn validate_cameras(cameras: &[CameraConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for camera in cameras {
        if camera.name.trim().is_empty() {
            return Err(Error::config("camera name must not be empty"));
        }
        if !seen.insert(camera.name.as_str()) {
            return Err(Error::config(format!("duplicate camera name '{}'", camera.name)));
        }
        PatternEngine::for_camera(camera)?;
    }
    Ok(())
}

/// Validate `cameras` and start one worker per usable camera.
///
/// # Errors
///
/// [`Error::Config`] if validation fails; no worker is started in that case.
/// Cameras with unusable sources or output folders are reported through
/// [`SimulationHandle::failed`] while the rest run.
pub async fn start(cameras: &[CameraConfig], ctx: SimulationContext) -> Result<SimulationHandle> {
    validate_cameras(cameras)?;

    let synth = SegmentSynthesizer::new(
        ctx.encoder.clone(),
        RetryPolicy::from_config(&ctx.simulator.retry),
    );

    let mut workers = Vec::new();
    let mut failed = Vec::new();
    for camera in cameras {
        match prepare(camera, &ctx, &synth).await {
            Ok(worker) => workers.push(worker),
            Err(error) => {
                tracing::error!(camera = %camera.name, "Camera not started: {error}");
                failed.push(CameraFailure {
                    camera: camera.name.clone(),
                    error,
                });
            }
        }
    }

    let cancel = CancellationToken::new();
    let running: Vec<RunningCamera> = workers
        .into_iter()
        .map(|worker| RunningCamera {
            name: worker.name().to_string(),
            status: worker.status(),
            task: tokio::spawn(worker.run(cancel.clone())),
        })
        .collect();

    let statuses: Vec<StatusHandle> = running.iter().map(|c| c.status.clone()).collect();
    let reporter = (ctx.simulator.status_interval_secs > 0).then(|| {
        status::spawn_reporter(
            statuses.clone(),
            Duration::from_secs(ctx.simulator.status_interval_secs),
            cancel.clone(),
        )
    });

    tracing::info!(
        started = running.len(),
        failed = failed.len(),
        "Simulation started"
    );

    Ok(SimulationHandle {
        stopper: Stopper { cancel, statuses },
        cameras: running,
        failed,
        reporter,
    })
}

/// Probe the source, create the output folder, and build the worker.
async fn prepare(
    camera: &CameraConfig,
    ctx: &SimulationContext,
    synth: &SegmentSynthesizer,
) -> Result<CameraWorker> {
    let source = &camera.source_video;
    check_source_file(source)?;

    let duration = ctx.probe.duration(source).await.map_err(|e| match e {
        e @ Error::UnusableSource { .. } => e,
        other => Error::unusable_source(source, other.to_string()),
    })?;
    tracing::debug!(
        camera = %camera.name,
        probe = ctx.probe.name(),
        duration_secs = duration.as_secs_f64(),
        "Probed source"
    );

    let folder = camera.output_folder();
    tokio::fs::create_dir_all(&folder).await?;

    let settings = WorkerSettings::from_config(camera, &ctx.simulator)?;
    CameraWorker::new(
        camera,
        duration,
        settings,
        synth.clone(),
        ctx.clock.clock_for_camera(),
    )
}
