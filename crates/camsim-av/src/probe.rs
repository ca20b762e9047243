//! Source video probing.
//!
//! The simulator only needs one fact about a source video: how long it is.
//! [`DurationProbe`] is the seam; [`FfprobeDurationProbe`] answers it by
//! shelling out to `ffprobe -print_format json -show_format`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Something that can report the playable duration of a source video.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Duration of the video at `path`.
    ///
    /// # Errors
    ///
    /// [`camsim_core::Error::UnusableSource`] when the file cannot be read
    /// or reports no positive duration.
    async fn duration(&self, path: &Path) -> camsim_core::Result<Duration>;
}

/// Check that a source file exists, is a regular file, and is non-empty.
pub fn check_source_file(path: &Path) -> camsim_core::Result<u64> {
    let meta = std::fs::metadata(path)
        .map_err(|e| camsim_core::Error::unusable_source(path, format!("cannot stat: {e}")))?;

    if !meta.is_file() {
        return Err(camsim_core::Error::unusable_source(path, "not a regular file"));
    }
    if meta.len() == 0 {
        return Err(camsim_core::Error::unusable_source(path, "file is empty"));
    }

    Ok(meta.len())
}

/// A duration probe backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeDurationProbe {
    /// Create a probe using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a probe from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry) -> camsim_core::Result<Self> {
        let ffprobe = tools.require("ffprobe")?;
        Ok(Self::new(ffprobe.path.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Extract the container duration from ffprobe's JSON output.
fn parse_duration(json: &str) -> Option<Duration> {
    let output: FfprobeOutput = serde_json::from_str(json).ok()?;
    let secs: f64 = output.format?.duration?.trim().parse().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn duration(&self, path: &Path) -> camsim_core::Result<Duration> {
        check_source_file(path)?;

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd
            .execute()
            .await
            .map_err(|e| camsim_core::Error::unusable_source(path, e.to_string()))?;

        let duration = parse_duration(&output.stdout).ok_or_else(|| {
            camsim_core::Error::unusable_source(path, "ffprobe reported no positive duration")
        })?;

        tracing::debug!(
            "Probed {}: {:.3}s",
            path.display(),
            duration.as_secs_f64()
        );
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camsim_core::Error;

    #[test]
    fn parse_duration_from_format() {
        let json = r#"{"format": {"filename": "a.mp4", "duration": "30.016000"}}"#;
        assert_eq!(parse_duration(json), Some(Duration::from_micros(30_016_000)));
    }

    #[test]
    fn parse_duration_rejects_missing_or_zero() {
        assert_eq!(parse_duration(r#"{"format": {}}"#), None);
        assert_eq!(parse_duration(r#"{"format": {"duration": "0.0"}}"#), None);
        assert_eq!(parse_duration(r#"{"format": {"duration": "N/A"}}"#), None);
        assert_eq!(parse_duration("not json"), None);
    }

    #[test]
    fn check_source_file_rejects_empty() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = check_source_file(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::UnusableSource { .. }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn check_source_file_rejects_missing_and_dirs() {
        assert!(check_source_file(Path::new("/nonexistent/source.mp4")).is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(check_source_file(dir.path()).is_err());
    }

    #[test]
    fn check_source_file_accepts_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        assert_eq!(check_source_file(&path).unwrap(), 18);
    }
}
