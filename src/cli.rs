use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "camsim")]
#[command(author, version, about = "Camera fleet simulator producing timestamped video segments")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured cameras until interrupted or the run duration ends
    Run {
        /// Accelerated pacing: skip sleeps and produce segments as fast as possible
        #[arg(long)]
        fast: bool,

        /// Simulated start instant, "YYYY-MM-DD HH:MM:SS" (local time)
        #[arg(long, value_parser = parse_start_time)]
        start_time: Option<chrono::NaiveDateTime>,

        /// Stop after this many hours of (simulated) time
        #[arg(long)]
        duration_hours: Option<f64>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Write a starter config file
    Init {
        /// File to write; the extension picks TOML, YAML or JSON
        #[arg(short, long, default_value = "camsim.toml")]
        output: PathBuf,

        /// Source video every camera loops over
        #[arg(long, default_value = "source_videos/test.mp4")]
        source: PathBuf,

        /// Directory holding one output folder per camera
        #[arg(long, default_value = "output")]
        output_base: PathBuf,

        /// Recording pattern for every camera
        #[arg(long, default_value = "continuous", value_parser = [
            "continuous",
            "motion_triggered",
            "event_triggered",
            "random_on_off",
        ])]
        pattern: String,

        /// Number of cameras to simulate
        #[arg(short = 'n', long, default_value = "1")]
        cameras: usize,

        /// Run duration in hours (0 runs until interrupted)
        #[arg(long, default_value = "24")]
        duration_hours: f64,

        /// Longest segment, in seconds
        #[arg(long, default_value = "60")]
        segment_secs: f64,

        /// Use accelerated pacing instead of real time
        #[arg(long)]
        fast: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Print the duration of a source video
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print the first intervals of a camera's recording pattern
    Schedule {
        /// Camera name from the config
        camera: String,

        /// Number of intervals to print
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Override the camera's random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Display version information
    Version,
}

fn parse_start_time(s: &str) -> Result<chrono::NaiveDateTime, String> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM:SS\": {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "camsim",
            "-c",
            "cams.toml",
            "run",
            "--fast",
            "--start-time",
            "2024-01-02 03:04:05",
            "--duration-hours",
            "1.5",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("cams.toml")));
        match cli.command {
            Commands::Run {
                fast,
                start_time,
                duration_hours,
            } => {
                assert!(fast);
                assert_eq!(start_time.unwrap().to_string(), "2024-01-02 03:04:05");
                assert_eq!(duration_hours, Some(1.5));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn init_defaults() {
        let cli = Cli::try_parse_from(["camsim", "init"]).unwrap();
        match cli.command {
            Commands::Init {
                output,
                pattern,
                cameras,
                fast,
                force,
                ..
            } => {
                assert_eq!(output, PathBuf::from("camsim.toml"));
                assert_eq!(pattern, "continuous");
                assert_eq!(cameras, 1);
                assert!(!fast);
                assert!(!force);
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn init_rejects_unknown_pattern() {
        let result = Cli::try_parse_from(["camsim", "init", "--pattern", "timelapse"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_start_time() {
        let result = Cli::try_parse_from(["camsim", "run", "--start-time", "yesterday"]);
        assert!(result.is_err());
    }
}
