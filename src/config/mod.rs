pub use camsim_core::config::*;

mod persist;
mod template;

pub use persist::save_config;
pub use template::ConfigTemplate;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_PATHS: &[&str] = &[
    "./camsim.toml",
    "./config.toml",
    "./config.yaml",
    "./config.yml",
    "~/.config/camsim/config.toml",
];

/// On-disk config syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` and `.yaml`/`.yml` by name; anything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

/// Load configuration from a TOML, YAML or JSON file (by extension; TOML otherwise)
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let parsed: Result<Config> = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::from_str(&content).map_err(Into::into),
        ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(Into::into),
        ConfigFormat::Toml => toml::from_str(&content).map_err(Into::into),
    };
    let config = parsed.with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {warning}", path.display());
    }

    Ok(config)
}

/// First existing file among [`DEFAULT_PATHS`].
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load config from the given path, the default locations, or fall back to
/// an empty default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => {
            tracing::debug!("Using config file {}", path.display());
            load_config(&path)
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "camsim.toml",
            r#"
[simulator]
run_duration_hours = 2.5
pacing = "accelerated"
drift_policy = "resync"

[simulator.retry]
max_retries = 7

[[cameras]]
name = "lobby"
source_video = "lobby.mp4"
segment_duration_max = 30
pattern = { kind = "motion_triggered", on_secs = [10, 20], off_secs = [30, 60] }

[[cameras]]
name = "gate"
source_video = "gate.mp4"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.simulator.pacing, PacingMode::Accelerated);
        assert_eq!(config.simulator.drift_policy, DriftPolicy::Resync);
        assert_eq!(config.simulator.retry.max_retries, 7);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(
            config.cameras[0].pattern,
            PatternConfig::MotionTriggered {
                on_secs: DurationRange::new(10.0, 20.0),
                off_secs: DurationRange::new(30.0, 60.0),
            }
        );
        assert_eq!(config.cameras[1].pattern.kind(), "continuous");
        assert_eq!(config.cameras[1].output_folder(), PathBuf::from("output/gate"));
    }

    #[test]
    fn loads_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "camsim.json",
            r#"{"cameras": [{"name": "yard", "source_video": "yard.mp4",
                "pattern": {"kind": "random_on_off", "slot_secs": 60, "probability": 0.25}}]}"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.cameras[0].name, "yard");
        assert_eq!(config.cameras[0].pattern.kind(), "random_on_off");
    }

    #[test]
    fn loads_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "config.yaml",
            r#"
simulator:
  run_duration_hours: 24
  retention:
    count: 50
cameras:
  - name: Camera01
    source_video: source_videos/test.mp4
    output_folder: output/Camera01
    segment_duration_max: 15
    pattern:
      kind: event_triggered
      on_secs: [2, 15]
      off_secs: [5, 30]
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.simulator.run_duration(), Some(std::time::Duration::from_secs(86_400)));
        assert_eq!(config.simulator.retention.count, 50);
        let camera = config.camera("Camera01").unwrap();
        assert_eq!(camera.output_folder(), PathBuf::from("output/Camera01"));
        match &camera.pattern {
            PatternConfig::EventTriggered {
                on_secs,
                trigger_probability,
                ..
            } => {
                assert_eq!(*on_secs, DurationRange::new(2.0, 15.0));
                assert_eq!(*trigger_probability, 0.5);
            }
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.conf")), ConfigFormat::Toml);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "broken.toml", "[[cameras]\nname = ");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = load_config_or_default(Some(Path::new("/nonexistent/camsim.toml")));
        assert!(result.is_err());
    }
}
