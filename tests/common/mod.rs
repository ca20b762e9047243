//! Shared test harness for integration tests.
//!
//! Provides [`FakeEncoder`] (records requests, writes a stub file, injects
//! failures), [`FakeProbe`] (fixed source durations), and [`TestHarness`]
//! which owns a temp directory and builds a [`SimulationContext`] on a
//! virtual clock.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camsim::clock::{ClockMode, SimulatedClock};
use camsim::config::{CameraConfig, PatternConfig, SimulatorConfig};
use camsim::orchestrator::SimulationContext;
use camsim_av::DurationProbe;
use camsim_core::{EncodeFailure, EncodeRequest, Encoder, FailureKind};
use chrono::{DateTime, Local, TimeZone};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Fixed start instant for simulated runs.
pub fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap()
}

/// An encoder that never touches ffmpeg.
#[derive(Default)]
pub struct FakeEncoder {
    requests: Mutex<Vec<EncodeRequest>>,
    /// 1-based call numbers that fail, with the failure kind.
    failures: Mutex<HashMap<usize, FailureKind>>,
}

impl FakeEncoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_call(&self, call: usize, kind: FailureKind) {
        self.failures.lock().insert(call, kind);
    }

    pub fn requests(&self) -> Vec<EncodeRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose output lives under `folder`.
    pub fn requests_in(&self, folder: &Path) -> Vec<EncodeRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.output.starts_with(folder))
            .collect()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeFailure> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(kind) = self.failures.lock().get(&call).copied() {
            return Err(EncodeFailure {
                kind,
                message: format!("injected failure on call {call}"),
            });
        }
        let body = format!("{} ranges", request.ranges.len());
        std::fs::write(&request.output, body)
            .map_err(|e| EncodeFailure::transient(e.to_string()))?;
        Ok(())
    }
}

/// Reports configured durations by path; anything else is 30 s.
#[derive(Default)]
pub struct FakeProbe {
    durations: HashMap<PathBuf, Duration>,
}

impl FakeProbe {
    pub fn with(mut self, path: impl Into<PathBuf>, duration: Duration) -> Self {
        self.durations.insert(path.into(), duration);
        self
    }
}

#[async_trait]
impl DurationProbe for FakeProbe {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn duration(&self, path: &Path) -> camsim_core::Result<Duration> {
        Ok(self
            .durations
            .get(path)
            .copied()
            .unwrap_or(Duration::from_secs(30)))
    }
}

/// Temp directory plus a fake encoder and probe.
pub struct TestHarness {
    pub dir: TempDir,
    pub encoder: Arc<FakeEncoder>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            encoder: FakeEncoder::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a source file with `bytes` of content and return its path.
    pub fn source(&self, name: &str, bytes: usize) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, vec![0u8; bytes]).expect("failed to write source");
        path
    }

    /// A continuous camera writing into `<tmp>/out/<name>`.
    pub fn camera(&self, name: &str, source: &Path, segment_max: f64) -> CameraConfig {
        let mut camera = CameraConfig::new(name, source);
        camera.output_folder = Some(self.output_folder(name));
        camera.segment_duration_max = segment_max;
        camera.pattern = PatternConfig::Continuous {
            segment_length: None,
        };
        camera.seed = Some(7);
        camera
    }

    pub fn output_folder(&self, name: &str) -> PathBuf {
        self.path().join("out").join(name)
    }

    /// Context on one shared virtual clock starting at [`t0`].
    pub fn context(&self, simulator: SimulatorConfig, probe: FakeProbe) -> SimulationContext {
        SimulationContext {
            simulator,
            encoder: self.encoder.clone(),
            probe: Arc::new(probe),
            clock: ClockMode::Accelerated { start: t0() },
        }
    }

    /// Context on a wall-clock-paced clock.
    pub fn realtime_context(&self, simulator: SimulatorConfig, probe: FakeProbe) -> SimulationContext {
        SimulationContext {
            simulator,
            encoder: self.encoder.clone(),
            probe: Arc::new(probe),
            clock: ClockMode::Realtime { start: None },
        }
    }

    /// Context where every camera shares `clock`.
    pub fn shared_clock_context(
        &self,
        simulator: SimulatorConfig,
        probe: FakeProbe,
        clock: Arc<SimulatedClock>,
    ) -> SimulationContext {
        SimulationContext {
            simulator,
            encoder: self.encoder.clone(),
            probe: Arc::new(probe),
            clock: ClockMode::Shared(clock),
        }
    }

    /// Sorted file names in `folder`.
    pub fn files(&self, folder: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(folder)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Simulator settings for tests: bounded run, no retries delay, no reporter.
pub fn simulator(run_secs: f64) -> SimulatorConfig {
    let mut sim = SimulatorConfig::default();
    sim.run_duration_hours = run_secs / 3600.0;
    sim.status_interval_secs = 0;
    sim.retry.max_retries = 2;
    sim.retry.initial_backoff_ms = 1;
    sim.retry.max_backoff_ms = 2;
    sim
}
