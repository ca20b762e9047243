//! Encoder capability.
//!
//! The simulator never talks to media tooling directly. It hands an
//! [`EncodeRequest`] to something implementing [`Encoder`] and gets back
//! either success or a classified [`EncodeFailure`]. The production
//! implementation shells out to ffmpeg (see `camsim-av`); tests plug in
//! fakes that record calls and inject faults.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A contiguous span of the source video: `offset + length` never exceeds
/// the source duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub offset: Duration,
    pub length: Duration,
}

impl SourceRange {
    pub fn new(offset: Duration, length: Duration) -> Self {
        Self { offset, length }
    }

    /// Offset one past the last instant covered by this range.
    pub fn end(&self) -> Duration {
        self.offset + self.length
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}s +{:.3}s]",
            self.offset.as_secs_f64(),
            self.length.as_secs_f64()
        )
    }
}

/// One invocation of the external encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    /// The source video the ranges refer to.
    pub source: PathBuf,
    /// Ranges to concatenate, in order.
    pub ranges: Vec<SourceRange>,
    /// Where the encoder must write its output.
    pub output: PathBuf,
    /// Wall-clock instant stamped into the container metadata.
    pub creation_time: DateTime<Local>,
}

impl EncodeRequest {
    /// Total duration of the requested output.
    pub fn total_length(&self) -> Duration {
        self.ranges.iter().map(|r| r.length).sum()
    }
}

/// Whether a failed encode is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, signals, I/O contention on the output path.
    Transient,
    /// Missing tool, unreadable source, invalid arguments.
    Permanent,
}

/// A classified encoder failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl EncodeFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

impl fmt::Display for EncodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

/// Something that can materialize an [`EncodeRequest`] as a file.
///
/// Implementations must have fully written and closed `request.output`
/// before returning `Ok(())`.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Perform one encode attempt. Retrying is the caller's business.
    async fn encode(&self, request: &EncodeRequest) -> std::result::Result<(), EncodeFailure>;
}
