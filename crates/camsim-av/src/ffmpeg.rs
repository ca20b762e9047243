//! Segment encoding with ffmpeg `-c copy`.
//!
//! A single source range is a plain trim (`-ss`/`-t`). Several ranges are
//! stitched with the concat demuxer: a temporary `ffconcat` list names the
//! source once per range with `inpoint`/`outpoint` directives, so a recording
//! that wraps around the end of the source comes out as one file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use camsim_core::{EncodeFailure, EncodeRequest, Encoder, Error, SourceRange};

use crate::command::{ToolCommand, SPAWN_FAILED};
use crate::tools::ToolRegistry;

/// stderr fragments that mean retrying cannot help.
const PERMANENT_MARKERS: &[&str] = &[
    "No such file or directory",
    "Invalid data found when processing input",
    "Invalid argument",
    "Unrecognized option",
    "Permission denied",
    "does not contain any stream",
];

/// [`Encoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    /// Build an encoder from a discovered registry.
    pub fn from_registry(tools: &ToolRegistry) -> camsim_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), ffmpeg.timeout))
    }

    fn base_command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(self.timeout);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
        cmd
    }

    /// Arguments for a single trim-and-copy.
    fn trim_command(&self, request: &EncodeRequest, range: &SourceRange) -> ToolCommand {
        let mut cmd = self.base_command();
        cmd.args(["-ss", &format_secs(range.offset)]);
        cmd.arg("-i");
        cmd.arg(request.source.to_string_lossy().as_ref());
        cmd.args(["-t", &format_secs(range.length)]);
        finish_command(&mut cmd, request);
        cmd
    }

    /// Arguments for a concat-demuxer run over `list`.
    fn concat_command(&self, request: &EncodeRequest, list: &Path) -> ToolCommand {
        let mut cmd = self.base_command();
        cmd.args(["-f", "concat", "-safe", "0", "-i"]);
        cmd.arg(list.to_string_lossy().as_ref());
        finish_command(&mut cmd, request);
        cmd
    }
}

fn finish_command(cmd: &mut ToolCommand, request: &EncodeRequest) {
    cmd.args(["-map", "0", "-c", "copy", "-avoid_negative_ts", "make_zero"]);
    cmd.arg("-metadata");
    cmd.arg(format!(
        "creation_time={}",
        request.creation_time.format("%Y-%m-%d %H:%M:%S")
    ));
    cmd.arg(request.output.to_string_lossy().as_ref());
}

fn format_secs(d: Duration) -> String {
    format!("{:.6}", d.as_secs_f64())
}

/// Quote a path for an ffconcat `file` directive.
fn concat_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Render the ffconcat list for a multi-range request.
fn concat_list(source: &Path, ranges: &[SourceRange]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for range in ranges {
        list.push_str(&format!("file {}\n", concat_quote(source)));
        list.push_str(&format!("inpoint {}\n", format_secs(range.offset)));
        list.push_str(&format!("outpoint {}\n", format_secs(range.end())));
    }
    list
}

/// Sort an ffmpeg failure into retryable or not.
fn classify(err: Error) -> EncodeFailure {
    let text = err.to_string();
    match &err {
        Error::ToolTimeout { .. } | Error::Io { .. } => EncodeFailure::transient(text),
        // ffmpeg missing or not executable.
        Error::Tool {
            message,
            exit_code: None,
            ..
        } if message.starts_with(SPAWN_FAILED) => EncodeFailure::permanent(text),
        Error::Tool {
            message,
            exit_code: Some(_),
            ..
        } if PERMANENT_MARKERS.iter().any(|m| message.contains(m)) => {
            EncodeFailure::permanent(text)
        }
        // Non-zero exit without a recognizable cause, or killed by a signal.
        Error::Tool { .. } => EncodeFailure::transient(text),
        _ => EncodeFailure::permanent(text),
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeFailure> {
        let result = match request.ranges.as_slice() {
            [] => {
                return Err(EncodeFailure::permanent("no source ranges requested"));
            }
            [range] => self.trim_command(request, range).execute().await,
            ranges => {
                // The list must outlive the ffmpeg run.
                let mut list = tempfile::Builder::new()
                    .prefix("camsim-")
                    .suffix(".ffconcat")
                    .tempfile()
                    .map_err(|e| EncodeFailure::transient(format!("concat list: {e}")))?;
                list.write_all(concat_list(&request.source, ranges).as_bytes())
                    .and_then(|_| list.flush())
                    .map_err(|e| EncodeFailure::transient(format!("concat list: {e}")))?;

                tracing::trace!(
                    ranges = ranges.len(),
                    list = %list.path().display(),
                    "Concatenating source ranges"
                );
                self.concat_command(request, list.path()).execute().await
            }
        };

        let out = result.map_err(classify)?;
        tracing::debug!(
            output = %request.output.display(),
            ranges = request.ranges.len(),
            elapsed_ms = out.elapsed.as_millis() as u64,
            "ffmpeg finished"
        );
        Ok(())
    }
}
