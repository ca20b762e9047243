//! Simulator configuration types.
//!
//! The top-level [`Config`] carries the simulator-wide settings, external tool
//! overrides, and one [`CameraConfig`] per simulated camera. Every section
//! defaults sensibly so an empty document is valid (it simply has no
//! cameras).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulator: SimulatorConfig,
    pub tools: ToolsConfig,
    pub cameras: Vec<CameraConfig>,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Look up a camera by name.
    pub fn camera(&self, name: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.name == name)
    }

    /// Return a list of validation warnings (non-fatal issues).
    ///
    /// Hard errors (bad pattern parameters, duplicate names) are raised when
    /// the simulation is started.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cameras.is_empty() {
            warnings.push("no cameras configured; nothing will be recorded".into());
        }

        if self.simulator.run_duration_hours < 0.0 {
            warnings.push(format!(
                "simulator.run_duration_hours is negative ({}); treated as unlimited",
                self.simulator.run_duration_hours
            ));
        }

        if self.simulator.output_extension.trim_start_matches('.').is_empty() {
            warnings.push("simulator.output_extension is empty; falling back to mp4".into());
        }

        if self.simulator.retention.enabled && self.simulator.retention.count == 0 {
            warnings.push("retention is enabled with count 0; every segment will be deleted".into());
        }

        for (i, cam) in self.cameras.iter().enumerate() {
            if cam.name.trim().is_empty() {
                warnings.push(format!("cameras[{i}].name is empty"));
            }
            if !cam.source_video.exists() {
                warnings.push(format!(
                    "cameras[{i}] '{}': source video {} does not exist",
                    cam.name,
                    cam.source_video.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Simulator-wide settings
// ---------------------------------------------------------------------------

/// Settings shared by all cameras.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// How long to run, in hours. `0` runs until interrupted.
    pub run_duration_hours: f64,
    /// Interval between status summaries in the log.
    pub status_interval_secs: u64,
    /// Whether cameras follow the wall clock or a virtual one.
    pub pacing: PacingMode,
    /// What to do when the encoder falls behind real time.
    pub drift_policy: DriftPolicy,
    /// Extension of written segments (without the dot).
    pub output_extension: String,
    pub retention: RetentionConfig,
    pub retry: RetryConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            run_duration_hours: 0.0,
            status_interval_secs: 60,
            pacing: PacingMode::default(),
            drift_policy: DriftPolicy::default(),
            output_extension: "mp4".into(),
            retention: RetentionConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// The configured run length rounded to the millisecond, or `None` for
    /// an unbounded run.
    pub fn run_duration(&self) -> Option<Duration> {
        let hours = self.run_duration_hours;
        let millis = (hours * 3_600_000.0).round();
        (hours.is_finite() && millis >= 1.0 && millis < u64::MAX as f64)
            .then(|| Duration::from_millis(millis as u64))
    }

    /// Extension without a leading dot, defaulting to `mp4`.
    pub fn extension(&self) -> &str {
        let ext = self.output_extension.trim_start_matches('.');
        if ext.is_empty() {
            "mp4"
        } else {
            ext
        }
    }
}

/// Clock the cameras are paced against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Segments are produced in step with the wall clock.
    #[default]
    Realtime,
    /// Each camera follows its own virtual clock; waits complete instantly.
    Accelerated,
}

/// Behavior when synthesis takes longer than the segment it produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Start the next segment late and log the drift.
    #[default]
    Drift,
    /// Drop whole segments that have already fallen behind the wall clock.
    Resync,
}

/// Deletion of old segments per camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Number of most recent segments kept per camera.
    pub count: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 100,
        }
    }
}

/// Retry behavior of segment synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Upper bound on a single ffmpeg invocation.
    pub encoder_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            encoder_timeout_secs: 300,
        }
    }
}

impl ToolsConfig {
    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_secs(self.encoder_timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Cameras
// ---------------------------------------------------------------------------

/// One simulated camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub source_video: PathBuf,
    /// Defaults to `output/<name>`.
    #[serde(default)]
    pub output_folder: Option<PathBuf>,
    #[serde(default)]
    pub pattern: PatternConfig,
    /// Longest single output file, in seconds.
    #[serde(default = "default_segment_duration_max")]
    pub segment_duration_max: f64,
    /// Seed for this camera's pattern; unseeded cameras draw from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_segment_duration_max() -> f64 {
    60.0
}

impl CameraConfig {
    /// Minimal camera with a continuous pattern, mostly useful in tests.
    pub fn new(name: impl Into<String>, source_video: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_video: source_video.into(),
            output_folder: None,
            pattern: PatternConfig::default(),
            segment_duration_max: default_segment_duration_max(),
            seed: None,
        }
    }

    /// Folder segments are written into.
    pub fn output_folder(&self) -> PathBuf {
        self.output_folder
            .clone()
            .unwrap_or_else(|| Path::new("output").join(&self.name))
    }

    /// Validated maximum segment length.
    pub fn segment_duration_max(&self) -> Result<Duration> {
        positive_secs(
            self.segment_duration_max,
            &format!("cameras '{}'.segment_duration_max", self.name),
        )
    }
}

/// Recording behavior of a camera. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternConfig {
    /// Always recording, in equal-length intervals.
    Continuous {
        /// Interval length; defaults to the camera's `segment_duration_max`.
        #[serde(default)]
        segment_length: Option<f64>,
    },
    /// Short recordings separated by idle gaps, starting idle.
    MotionTriggered {
        #[serde(default = "default_motion_on")]
        on_secs: DurationRange,
        #[serde(default = "default_motion_off")]
        off_secs: DurationRange,
    },
    /// Sparse recordings gated by a trigger probability.
    EventTriggered {
        #[serde(default = "default_event_on")]
        on_secs: DurationRange,
        #[serde(default = "default_event_off")]
        off_secs: DurationRange,
        #[serde(default = "default_trigger_probability")]
        trigger_probability: f64,
        /// Consecutive suppressed triggers before one is forced.
        #[serde(default = "default_max_suppressed")]
        max_suppressed: u32,
    },
    /// Fixed slots, each independently on with `probability`.
    RandomOnOff {
        #[serde(default = "default_slot_secs")]
        slot_secs: f64,
        #[serde(default = "default_on_probability")]
        probability: f64,
        /// Longest run of equal slots merged into one interval.
        #[serde(default = "default_max_coalesced_slots")]
        max_coalesced_slots: u32,
    },
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig::Continuous {
            segment_length: None,
        }
    }
}

impl PatternConfig {
    /// Every `kind` tag, in documentation order.
    pub const KINDS: [&'static str; 4] = [
        "continuous",
        "motion_triggered",
        "event_triggered",
        "random_on_off",
    ];

    /// The pattern of `kind` with every parameter at its default.
    pub fn with_defaults(kind: &str) -> Option<Self> {
        let pattern = match kind {
            "continuous" => PatternConfig::default(),
            "motion_triggered" => PatternConfig::MotionTriggered {
                on_secs: default_motion_on(),
                off_secs: default_motion_off(),
            },
            "event_triggered" => PatternConfig::EventTriggered {
                on_secs: default_event_on(),
                off_secs: default_event_off(),
                trigger_probability: default_trigger_probability(),
                max_suppressed: default_max_suppressed(),
            },
            "random_on_off" => PatternConfig::RandomOnOff {
                slot_secs: default_slot_secs(),
                probability: default_on_probability(),
                max_coalesced_slots: default_max_coalesced_slots(),
            },
            _ => return None,
        };
        Some(pattern)
    }

    /// The `kind` tag as written in config files.
    pub fn kind(&self) -> &'static str {
        match self {
            PatternConfig::Continuous { .. } => "continuous",
            PatternConfig::MotionTriggered { .. } => "motion_triggered",
            PatternConfig::EventTriggered { .. } => "event_triggered",
            PatternConfig::RandomOnOff { .. } => "random_on_off",
        }
    }
}

fn default_motion_on() -> DurationRange {
    DurationRange::new(300.0, 1200.0)
}
fn default_motion_off() -> DurationRange {
    DurationRange::new(600.0, 1800.0)
}
fn default_event_on() -> DurationRange {
    DurationRange::new(180.0, 600.0)
}
fn default_event_off() -> DurationRange {
    DurationRange::new(1200.0, 3600.0)
}
fn default_trigger_probability() -> f64 {
    0.5
}
fn default_max_suppressed() -> u32 {
    5
}
fn default_slot_secs() -> f64 {
    3600.0
}
fn default_on_probability() -> f64 {
    0.5
}
fn default_max_coalesced_slots() -> u32 {
    24
}

/// Inclusive `[min, max]` range of seconds, written as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
}

impl DurationRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl From<[f64; 2]> for DurationRange {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<DurationRange> for [f64; 2] {
    fn from(r: DurationRange) -> Self {
        [r.min, r.max]
    }
}

/// Convert a seconds value into a [`Duration`], rejecting values that are
/// not finite or do not amount to at least one nanosecond, with a
/// [`Error::Config`] naming `field`.
pub fn positive_secs(value: f64, field: &str) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Config(format!(
            "{field} must be a positive number of seconds, got {value}"
        )));
    }
    let duration = Duration::try_from_secs_f64(value)
        .map_err(|e| Error::Config(format!("{field} is out of range ({value}): {e}")))?;
    if duration.is_zero() {
        return Err(Error::Config(format!(
            "{field} is below one nanosecond, got {value}"
        )));
    }
    Ok(duration)
}

/// Check that `value` is a probability in `[0, 1]`.
pub fn probability(value: f64, field: &str) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!(
            "{field} must be within [0, 1], got {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_cameras() {
        let cfg = Config::default();
        assert!(cfg.cameras.is_empty());
        assert_eq!(cfg.simulator.status_interval_secs, 60);
        assert_eq!(cfg.simulator.extension(), "mp4");
        assert_eq!(cfg.simulator.retry.max_retries, 3);
        assert!(cfg.simulator.run_duration().is_none());
    }

    #[test]
    fn empty_config_warns_about_cameras() {
        let warnings = Config::default().validate();
        assert!(warnings.iter().any(|w| w.contains("no cameras")));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{
            "simulator": {"run_duration_hours": 2, "pacing": "accelerated"},
            "cameras": [{
                "name": "front",
                "source_video": "/videos/front.mp4",
                "pattern": {"kind": "motion_triggered", "on_secs": [5, 20]}
            }]
        }"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.simulator.pacing, PacingMode::Accelerated);
        assert_eq!(
            cfg.simulator.run_duration(),
            Some(Duration::from_secs(7200))
        );
        let cam = cfg.camera("front").unwrap();
        assert_eq!(
            cam.pattern,
            PatternConfig::MotionTriggered {
                on_secs: DurationRange::new(5.0, 20.0),
                off_secs: default_motion_off(),
            }
        );
        assert_eq!(cam.output_folder(), PathBuf::from("output/front"));
        assert_eq!(cam.segment_duration_max().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn pattern_defaults_to_continuous() {
        let json = r#"{"cameras": [{"name": "a", "source_video": "a.mp4"}]}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.cameras[0].pattern.kind(), "continuous");
    }

    #[test]
    fn unknown_pattern_kind_is_rejected() {
        let json = r#"{"cameras": [{"name": "a", "source_video": "a.mp4",
            "pattern": {"kind": "timelapse"}}]}"#;
        assert!(matches!(Config::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn every_kind_has_defaults() {
        for kind in PatternConfig::KINDS {
            let pattern = PatternConfig::with_defaults(kind).unwrap();
            assert_eq!(pattern.kind(), kind);
        }
        assert!(PatternConfig::with_defaults("timelapse").is_none());
    }

    #[test]
    fn missing_source_warns() {
        let mut cfg = Config::default();
        cfg.cameras
            .push(CameraConfig::new("cam", "/nonexistent/source.mp4"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn positive_secs_rejects_bad_values() {
        assert!(positive_secs(0.0, "x").is_err());
        assert!(positive_secs(-1.0, "x").is_err());
        assert!(positive_secs(f64::NAN, "x").is_err());
        assert!(positive_secs(1e-12, "x").is_err());
        assert_eq!(positive_secs(1.5, "x").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn probability_bounds() {
        assert!(probability(0.0, "p").is_ok());
        assert!(probability(1.0, "p").is_ok());
        assert!(probability(1.01, "p").is_err());
        assert!(probability(-0.1, "p").is_err());
    }
}
