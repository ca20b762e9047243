//! Async subprocess runner with a hard time limit.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use camsim_core::Error;
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Message prefix of an [`Error::Tool`] raised when the program never started.
pub(crate) const SPAWN_FAILED: &str = "failed to spawn";

/// What a finished tool run left behind.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Wall time from spawn to exit.
    pub elapsed: Duration,
}

/// An external tool invocation: program, arguments, and time limit.
///
/// ```no_run
/// use camsim_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> camsim_core::Result<()> {
/// let out = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/videos/lobby.mp4")
///     .execute()
///     .await?;
/// println!("{}", out.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short tool name for errors and logs (`ffmpeg`, not `/usr/bin/ffmpeg`).
    fn tool_name(&self) -> String {
        match self.program.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.program.to_string_lossy().into_owned(),
        }
    }

    /// Run to completion, capturing stdout and stderr. stdin is closed.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolTimeout`] if the process outlives the timeout; the
    ///   child is killed.
    /// - [`Error::Tool`] with `exit_code` set if the process exits non-zero
    ///   (message includes stderr), or `None` if it was killed by a signal
    ///   or could not be spawned.
    pub async fn execute(&self) -> camsim_core::Result<ToolOutput> {
        let tool = self.tool_name();
        tracing::trace!(tool = %tool, args = ?self.args, "Spawning");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(&tool, format!("{SPAWN_FAILED}: {e}")))?;

        let started = Instant::now();
        // On timeout the wait future, and with it the child, is dropped and killed.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::ToolTimeout {
                tool: tool.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| Error::tool(&tool, format!("I/O error waiting for process: {e}")))?;

        let out = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started.elapsed(),
        };

        if !out.status.success() {
            return Err(Error::Tool {
                message: format!("exited with status {}: {}", out.status, out.stderr.trim()),
                exit_code: out.status.code(),
                tool,
            });
        }
        Ok(out)
    }
}
