//! # camsim-av
//!
//! External media tooling for the camsim simulator.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe, honoring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Source probing** ([`FfprobeDurationProbe`]) -- duration of a source
//!   video via ffprobe, behind the [`DurationProbe`] trait.
//! - **Segment encoding** ([`FfmpegEncoder`]) -- trim or concatenate source
//!   ranges into one output file, implementing [`camsim_core::Encoder`].

pub mod command;
pub mod ffmpeg;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use ffmpeg::FfmpegEncoder;
pub use probe::{DurationProbe, FfprobeDurationProbe};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
