//! Unified error type for camsim.
//!
//! All crates funnel their failures into [`Error`]. The variants mirror the
//! simulator's failure taxonomy: configuration problems abort the whole run,
//! an unusable source only takes down its own camera, and synthesis failures
//! are confined to a single segment.

use std::path::PathBuf;
use std::time::Duration;

/// Unified error type covering all failure modes in camsim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration failed validation (bad pattern parameters, duplicate
    /// camera names, unreadable values).
    #[error("Config error: {0}")]
    Config(String),

    /// The source video of a camera is missing, empty, or has no duration.
    #[error("Unusable source {}: {reason}", path.display())]
    UnusableSource {
        /// Path of the offending source video.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// A caller broke an operation's contract (e.g. non-positive duration).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Segment synthesis gave up, either after exhausting its retries or on
    /// a permanent encoder failure.
    #[error("Synthesis failed after {attempts} attempt(s): {message}")]
    SynthesisFailed {
        /// Number of encoder invocations performed.
        attempts: u32,
        /// Last failure message from the encoder.
        message: String,
    },

    /// An external tool (ffmpeg, ffprobe) could not run or exited non-zero.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
        /// Exit code, when the process ran to completion.
        exit_code: Option<i32>,
    },

    /// An external tool ran longer than its allowed time.
    #[error("Tool error [{tool}]: timed out after {timeout:?}")]
    ToolTimeout {
        /// Name of the tool that timed out.
        tool: String,
        /// The configured limit.
        timeout: Duration,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Convenience constructor for [`Error::UnusableSource`].
    pub fn unusable_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::UnusableSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`] without an exit code.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
            exit_code: None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
