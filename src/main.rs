mod cli;

use camsim::clock::ClockMode;
use camsim::config::{self, Config, ConfigTemplate, PacingMode};
use camsim::orchestrator::{self, SimulationContext};
use camsim::pattern::{camera_rng, PatternEngine};
use camsim::status::format_duration;
use camsim_av::probe::check_source_file;
use camsim_av::{DurationProbe, FfmpegEncoder, FfprobeDurationProbe, ToolRegistry};
use camsim_core::Encoder;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "camsim=debug,camsim_av=debug,camsim_core=debug".to_string()
        } else {
            "camsim=info,camsim_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            fast,
            start_time,
            duration_hours,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_simulation(
                cli.config.as_deref(),
                fast,
                start_time,
                duration_hours,
            ))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Init {
            output,
            source,
            output_base,
            pattern,
            cameras,
            duration_hours,
            segment_secs,
            fast,
            force,
        } => {
            let template = ConfigTemplate {
                source_video: source,
                output_base,
                pattern,
                cameras,
                run_duration_hours: duration_hours,
                segment_secs,
                realtime: !fast,
            };
            init_config(&output, &template, force)
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Probe { file } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, cli.config.as_deref()))
        }
        Commands::Schedule {
            camera,
            count,
            seed,
        } => print_schedule(cli.config.as_deref(), &camera, count, seed),
        Commands::Version => {
            println!("camsim {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_simulation(
    config_path: Option<&Path>,
    fast: bool,
    start_time: Option<NaiveDateTime>,
    duration_hours: Option<f64>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if fast {
        config.simulator.pacing = PacingMode::Accelerated;
    }
    if let Some(hours) = duration_hours {
        config.simulator.run_duration_hours = hours;
    }
    if config.cameras.is_empty() {
        anyhow::bail!("No cameras configured");
    }

    let start = start_time.map(local_instant).transpose()?;
    let clock = match config.simulator.pacing {
        PacingMode::Realtime => ClockMode::Realtime { start },
        PacingMode::Accelerated => {
            if config.simulator.run_duration().is_none() {
                tracing::warn!("Accelerated pacing without a run duration runs until interrupted");
            }
            ClockMode::Accelerated {
                start: start.unwrap_or_else(Local::now),
            }
        }
    };

    let tools = ToolRegistry::discover(&config.tools);
    let encoder: Arc<dyn Encoder> = match FfmpegEncoder::from_registry(&tools) {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            tracing::warn!("{e}; segments will fail until ffmpeg is available");
            Arc::new(FfmpegEncoder::new(
                PathBuf::from("ffmpeg"),
                config.tools.encoder_timeout(),
            ))
        }
    };
    let probe: Arc<dyn DurationProbe> = match FfprobeDurationProbe::from_registry(&tools) {
        Ok(probe) => Arc::new(probe),
        Err(e) => {
            tracing::warn!("{e}; sources cannot be probed");
            Arc::new(FfprobeDurationProbe::new(PathBuf::from("ffprobe")))
        }
    };

    tracing::info!(
        cameras = config.cameras.len(),
        pacing = ?config.simulator.pacing,
        drift_policy = ?config.simulator.drift_policy,
        "Starting camsim"
    );

    let ctx = SimulationContext {
        simulator: config.simulator.clone(),
        encoder,
        probe,
        clock,
    };
    let handle = orchestrator::start(&config.cameras, ctx).await?;

    if handle.running().is_empty() {
        let summary = handle.wait().await;
        print!("{summary}");
        anyhow::bail!("No camera could be started");
    }

    let done = CancellationToken::new();
    let stopper = handle.stopper();
    let signal_task = tokio::spawn({
        let done = done.clone();
        async move {
            if shutdown_signal(done).await {
                stopper.stop();
            }
        }
    });

    let summary = handle.wait().await;
    done.cancel();
    let _ = signal_task.await;

    println!();
    print!("{summary}");
    println!("Total segments written: {}", summary.segments_written());

    if let Some(failed) = summary.first_error() {
        anyhow::bail!(
            "Camera '{}' stopped on an error: {}",
            failed.camera,
            failed.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

fn local_instant(naive: NaiveDateTime) -> Result<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Start time {naive} does not exist in the local time zone"))
}

/// Wait for SIGINT or SIGTERM. Returns `false` if `done` fired first.
async fn shutdown_signal(done: CancellationToken) -> bool {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = done.cancelled() => return false,
    }

    tracing::info!("Shutdown signal received");
    true
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => match config::find_default_config() {
            Some(p) => {
                println!("Validating config: {:?}", p);
                config::load_config(&p)?
            }
            None => {
                println!("No config file specified, using defaults");
                Config::default()
            }
        },
    };

    orchestrator::validate_cameras(&config.cameras)?;

    println!("✓ Configuration is valid");
    let run = match config.simulator.run_duration() {
        Some(d) => format_duration(d),
        None => "until interrupted".to_string(),
    };
    println!("  Run duration: {run}");
    println!("  Pacing: {:?}", config.simulator.pacing);
    println!("  Drift policy: {:?}", config.simulator.drift_policy);
    println!("  Cameras: {}", config.cameras.len());
    for camera in &config.cameras {
        println!(
            "    {} [{}] {} -> {}",
            camera.name,
            camera.pattern.kind(),
            camera.source_video.display(),
            camera.output_folder().display()
        );
    }

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("  Warnings:");
        for w in &warnings {
            println!("    - {w}");
        }
    }

    Ok(())
}

fn init_config(path: &Path, template: &ConfigTemplate, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let config = template.build()?;
    orchestrator::validate_cameras(&config.cameras)?;
    config::save_config(path, &config)?;

    println!(
        "✓ Wrote {} camera(s) [{}] to {}",
        config.cameras.len(),
        template.pattern,
        path.display()
    );
    if !template.source_video.exists() {
        println!(
            "  Note: {} does not exist yet; create it before running",
            template.source_video.display()
        );
    }
    println!("Run with: camsim -c {} run", path.display());
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Segments cannot be produced without ffmpeg and ffprobe.");
    }

    Ok(())
}

async fn probe_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let size = check_source_file(file)?;

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let probe = FfprobeDurationProbe::from_registry(&tools)?;
    let duration = probe.duration(file).await?;

    println!("File: {}", file.display());
    println!("Size: {} bytes", size);
    println!(
        "Duration: {:.3}s ({})",
        duration.as_secs_f64(),
        format_duration(duration)
    );
    Ok(())
}

fn print_schedule(config_path: Option<&Path>, name: &str, count: usize, seed: Option<u64>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let camera = config
        .camera(name)
        .with_context(|| format!("No camera named '{name}' in config"))?;

    let mut engine = PatternEngine::for_camera(camera)?;
    if let Some(seed) = seed {
        engine = PatternEngine::from_config(
            &camera.pattern,
            camera.segment_duration_max()?,
            camera_rng(Some(seed)),
        )?;
    }

    println!("{} [{}]", camera.name, engine.kind());
    let mut offset = Duration::ZERO;
    let mut active = Duration::ZERO;
    for interval in engine.take(count) {
        println!("  +{:>10}  {interval}", format_duration(offset));
        offset += interval.duration;
        if interval.active {
            active += interval.duration;
        }
    }
    if !offset.is_zero() {
        println!(
            "Duty cycle: {:.1}% over {}",
            100.0 * active.as_secs_f64() / offset.as_secs_f64(),
            format_duration(offset)
        );
    }
    Ok(())
}
