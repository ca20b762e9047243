//! Read position within a looping source video.

use std::path::Path;
use std::time::Duration;

use camsim_core::{Error, Result, SourceRange};

/// Tracks how much of a finite source has been played and hands out the
/// ranges needed to cover a requested duration, wrapping around the end of
/// the source as often as necessary.
///
/// Each camera owns its own cursor, even when several cameras share a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCursor {
    source_duration: Duration,
    position: Duration,
}

impl SourceCursor {
    /// # Errors
    ///
    /// [`Error::UnusableSource`] if `source_duration` is zero.
    pub fn new(source: &Path, source_duration: Duration) -> Result<Self> {
        if source_duration.is_zero() {
            return Err(Error::unusable_source(source, "source has zero duration"));
        }
        Ok(Self {
            source_duration,
            position: Duration::ZERO,
        })
    }

    pub fn source_duration(&self) -> Duration {
        self.source_duration
    }

    /// Current offset into the source; always `< source_duration`.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Consume `duration` worth of source, returning the ranges in play
    /// order. Their lengths sum to exactly `duration`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] if `duration` is zero.
    pub fn advance(&mut self, duration: Duration) -> Result<Vec<SourceRange>> {
        if duration.is_zero() {
            return Err(Error::InvalidRequest(
                "source cursor asked to advance by zero".into(),
            ));
        }

        let loops = duration.as_nanos() / self.source_duration.as_nanos();
        let mut ranges = Vec::with_capacity(loops.min(64) as usize + 1);
        let mut remaining = duration;

        while !remaining.is_zero() {
            let tail = self.source_duration - self.position;
            let length = remaining.min(tail);
            ranges.push(SourceRange::new(self.position, length));
            remaining -= length;

            self.position += length;
            if self.position == self.source_duration {
                self.position = Duration::ZERO;
            }
        }

        Ok(ranges)
    }
}
