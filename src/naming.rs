//! Segment file naming.
//!
//! Segments are named `{camera}_{YYYYMMDD}_{HHMMSS}.{ext}` after the
//! wall-clock instant their synthesis was requested. Two segments of one
//! camera requested within the same second get `_1`, `_2`, ... appended.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Hands out output paths for one camera.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    camera: String,
    folder: PathBuf,
    extension: String,
    last_stamp: Option<String>,
    disambiguator: u32,
}

impl SegmentNamer {
    pub fn new(camera: impl Into<String>, folder: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            camera: camera.into(),
            folder: folder.into(),
            extension: extension.trim_start_matches('.').to_string(),
            last_stamp: None,
            disambiguator: 0,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Final output path for a segment requested at `at`.
    ///
    /// Never returns the same path twice, and skips names already present on
    /// disk (left over from an earlier run).
    pub fn next_path(&mut self, at: DateTime<Local>) -> PathBuf {
        let stamp = at.format("%Y%m%d_%H%M%S").to_string();
        if self.last_stamp.as_deref() == Some(stamp.as_str()) {
            self.disambiguator += 1;
        } else {
            self.last_stamp = Some(stamp.clone());
            self.disambiguator = 0;
        }

        loop {
            let path = self.folder.join(self.file_name(&stamp, self.disambiguator));
            if !path.exists() {
                return path;
            }
            self.disambiguator += 1;
        }
    }

    fn file_name(&self, stamp: &str, n: u32) -> String {
        if n == 0 {
            format!("{}_{stamp}.{}", self.camera, self.extension)
        } else {
            format!("{}_{stamp}_{n}.{}", self.camera, self.extension)
        }
    }

    /// Whether `file_name` is a finished segment of this camera.
    ///
    /// Guards against prefix clashes such as cameras `front` and
    /// `front_door` sharing a folder.
    pub fn owns(&self, file_name: &str) -> bool {
        let Some(rest) = file_name
            .strip_prefix(self.camera.as_str())
            .and_then(|r| r.strip_prefix('_'))
        else {
            return false;
        };
        let Some(stem) = rest.strip_suffix(self.extension.as_str()).and_then(|r| r.strip_suffix('.')) else {
            return false;
        };

        let bytes = stem.as_bytes();
        if bytes.len() < 15 || bytes[8] != b'_' {
            return false;
        }
        let digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);
        if !digits(&bytes[..8]) || !digits(&bytes[9..15]) {
            return false;
        }
        match &stem[15..] {
            "" => true,
            suffix => suffix
                .strip_prefix('_')
                .is_some_and(|n| !n.is_empty() && digits(n.as_bytes())),
        }
    }
}

/// Hidden sibling of `final_path` that the encoder writes to before the
/// finished file is renamed into place. Keeps the extension so the encoder
/// can infer the container.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "segment".to_string());
    let name = match final_path.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    final_path.with_file_name(name)
}
