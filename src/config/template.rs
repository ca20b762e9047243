//! Starter configuration for `camsim init`.

use super::{CameraConfig, Config, PacingMode, PatternConfig, SimulatorConfig};
use anyhow::{bail, Result};
use std::path::PathBuf;

/// Answers that shape a generated config: one source, one pattern, and a
/// number of identical cameras named `Camera01`, `Camera02`, ...
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    pub source_video: PathBuf,
    pub output_base: PathBuf,
    pub pattern: String,
    pub cameras: usize,
    pub run_duration_hours: f64,
    pub segment_secs: f64,
    pub realtime: bool,
}

impl Default for ConfigTemplate {
    fn default() -> Self {
        Self {
            source_video: PathBuf::from("source_videos/test.mp4"),
            output_base: PathBuf::from("output"),
            pattern: "continuous".into(),
            cameras: 1,
            run_duration_hours: 24.0,
            segment_secs: 60.0,
            realtime: true,
        }
    }
}

impl ConfigTemplate {
    pub fn build(&self) -> Result<Config> {
        let Some(pattern) = PatternConfig::with_defaults(&self.pattern) else {
            bail!(
                "Unknown pattern '{}' (expected one of: {})",
                self.pattern,
                PatternConfig::KINDS.join(", ")
            );
        };
        if self.cameras == 0 {
            bail!("At least one camera is required");
        }

        let cameras = (1..=self.cameras)
            .map(|i| {
                let name = format!("Camera{i:02}");
                CameraConfig {
                    output_folder: Some(self.output_base.join(&name)),
                    pattern: pattern.clone(),
                    segment_duration_max: self.segment_secs,
                    ..CameraConfig::new(name, self.source_video.clone())
                }
            })
            .collect();

        Ok(Config {
            simulator: SimulatorConfig {
                run_duration_hours: self.run_duration_hours,
                pacing: if self.realtime {
                    PacingMode::Realtime
                } else {
                    PacingMode::Accelerated
                },
                ..SimulatorConfig::default()
            },
            cameras,
            ..Config::default()
        })
    }
}
