//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe and provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

/// Default tool timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// A discovered external tool.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    pub timeout: Duration,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used when it exists; otherwise [`which::which`]
    /// locates the tool. Tools that are not found are omitted. Every tool
    /// gets the configured encoder timeout.
    pub fn discover(tools_config: &camsim_core::config::ToolsConfig) -> Self {
        let mut tools = HashMap::new();
        let timeout = tools_config.encoder_timeout();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            if let Some(path) = resolve(name, custom_path) {
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                        timeout,
                    },
                );
            }
        }

        Self { tools }
    }

    /// Register a tool at an explicit path, bypassing discovery.
    pub fn with_tool(mut self, name: &str, path: PathBuf) -> Self {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path,
                timeout: DEFAULT_TIMEOUT,
            },
        );
        self
    }

    /// Return the [`ToolConfig`] for the given tool, or an
    /// [`camsim_core::Error::Tool`] if it was not found during discovery.
    pub fn require(&self, name: &str) -> camsim_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            camsim_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Whether a tool was found.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

fn resolve(name: &str, custom_path: Option<&Path>) -> Option<PathBuf> {
    match custom_path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => {
            tracing::warn!(
                "Configured {name} path {} does not exist; searching PATH",
                p.display()
            );
            which::which(name).ok()
        }
        None => which::which(name).ok(),
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camsim_core::config::ToolsConfig;

    #[test]
    fn discover_with_default_config() {
        let cfg = ToolsConfig::default();
        let registry = ToolRegistry::discover(&cfg);
        // No tool is guaranteed to be installed; the call must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let result = registry.require("ffmpeg");
        assert!(result.is_err());
        assert!(!registry.has("ffmpeg"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::default();
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn with_tool_registers_explicit_path() {
        let registry = ToolRegistry::default().with_tool("ffmpeg", PathBuf::from("/opt/ffmpeg"));
        let tool = registry.require("ffmpeg").unwrap();
        assert_eq!(tool.path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(tool.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn missing_override_falls_back_to_path_lookup() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        if let Ok(tool) = registry.require("ffmpeg") {
            assert_ne!(tool.path, PathBuf::from("/nonexistent/ffmpeg"));
        }
    }
}
