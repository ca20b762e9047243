//! Segment synthesis: one output file from one or more source ranges.
//!
//! [`SegmentSynthesizer`] wraps an [`Encoder`] with the parts every encoder
//! shares: staging the output under a hidden name so readers never observe a
//! partial file, stamping the file's modification time, and retrying
//! transient failures with exponential backoff.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use camsim_core::config::RetryConfig;
use camsim_core::{EncodeFailure, EncodeRequest, Encoder, Error, Result, SourceRange};
use chrono::{DateTime, Local};

use crate::naming::staging_path;

/// How often and how patiently to retry a failed encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// A successfully written segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisReport {
    pub path: PathBuf,
    /// Encoder invocations it took, including the successful one.
    pub attempts: u32,
    pub bytes: u64,
}

/// Turns source ranges into finished segment files.
#[derive(Clone)]
pub struct SegmentSynthesizer {
    encoder: Arc<dyn Encoder>,
    retry: RetryPolicy,
}

impl SegmentSynthesizer {
    pub fn new(encoder: Arc<dyn Encoder>, retry: RetryPolicy) -> Self {
        Self { encoder, retry }
    }

    /// Write `ranges` of `source`, in order, as a single file at `output`.
    ///
    /// On success the file is complete, closed, and carries `creation_time`
    /// as its modification time.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `ranges` is empty.
    /// - [`Error::SynthesisFailed`] after a permanent failure or once the
    ///   retries are exhausted. Nothing is left at `output` in that case.
    pub async fn synthesize(
        &self,
        source: &Path,
        ranges: &[SourceRange],
        output: &Path,
        creation_time: DateTime<Local>,
    ) -> Result<SynthesisReport> {
        if ranges.is_empty() {
            return Err(Error::InvalidRequest("no source ranges to synthesize".into()));
        }

        let staging = staging_path(output);
        let request = EncodeRequest {
            source: source.to_path_buf(),
            ranges: ranges.to_vec(),
            output: staging.clone(),
            creation_time,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;

            let failure = match self.attempt(&request, output).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        tracing::debug!(
                            output = %output.display(),
                            attempts,
                            "Synthesis succeeded after retry"
                        );
                    }
                    return Ok(SynthesisReport {
                        path: output.to_path_buf(),
                        attempts,
                        bytes,
                    });
                }
                Err(failure) => failure,
            };

            discard(&staging).await;

            let retries_used = attempts - 1;
            if !failure.is_transient() || retries_used >= self.retry.max_retries {
                return Err(Error::SynthesisFailed {
                    attempts,
                    message: failure.to_string(),
                });
            }

            let delay = self.retry.backoff(attempts);
            tracing::debug!(
                encoder = self.encoder.name(),
                output = %output.display(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient synthesis failure, retrying: {failure}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One encode into the staging path, then publish it at `output`.
    async fn attempt(&self, request: &EncodeRequest, output: &Path) -> std::result::Result<u64, EncodeFailure> {
        self.encoder.encode(request).await?;

        let staging = &request.output;
        let bytes = tokio::fs::metadata(staging)
            .await
            .map_err(|e| EncodeFailure::transient(format!("encoder left no output: {e}")))?
            .len();
        if bytes == 0 {
            return Err(EncodeFailure::transient("encoder produced an empty file"));
        }

        stamp_mtime(staging, request.creation_time)
            .await
            .map_err(|e| EncodeFailure::transient(format!("setting modification time: {e}")))?;

        tokio::fs::rename(staging, output)
            .await
            .map_err(|e| EncodeFailure::transient(format!("publishing {}: {e}", output.display())))?;

        Ok(bytes)
    }
}

async fn stamp_mtime(path: &Path, at: DateTime<Local>) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(SystemTime::from(at))
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove staging file {}: {e}", staging.display());
        }
    }
}
