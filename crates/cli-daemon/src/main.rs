use anyhow::{Context, Result};
use clap::Parser;
use hbwatch::{
    logging, scan,
    watch::{run_watch_loop, DirectoryWatcher},
    ConsoleReporter, Dispatcher, Orchestrator, PresetCheck, WatchConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{error, info, warn};
use tokio::sync::mpsc;

/// Config file looked up in the current directory when --config is not given
const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Watch a folder for video files and encode them with HandBrakeCLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Process files already in the input directory, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let cfg = WatchConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    let log_path = logging::init_logging(&cfg, args.verbose)?;

    info!("Starting HandBrake Folder Watcher");
    if let Some(path) = &config_path {
        info!("Configuration: {}", path.display());
    }
    info!("Log file: {}", log_path.display());
    info!("Encoding preset: {}", cfg.preset);
    info!(
        "Video extensions: {}",
        cfg.video_extensions.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    info!(
        "Stabilization: {} sample(s), {}s apart",
        cfg.stabilization_samples, cfg.stabilization_interval_secs
    );

    println!("\n🔧 Checking directories...");
    for (name, dir) in [("Input", &cfg.input_dir), ("Output", &cfg.output_dir), ("Done", &cfg.done_dir)] {
        prepare_dir(name, dir)?;
    }
    println!();

    let cfg = Arc::new(cfg);
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&cfg), Arc::new(ConsoleReporter::new())));

    match orchestrator.encoder().probe().await {
        Ok(version) => info!("HandBrakeCLI found: {}", version.0),
        Err(e) => {
            error!("HandBrakeCLI not found!");
            error!("Please install HandBrake CLI:");
            error!("  macOS: brew install handbrake");
            error!("  Or download from: https://handbrake.fr/downloads.php");
            return Err(e.into());
        }
    }

    match orchestrator.encoder().check_preset(&cfg.preset).await {
        PresetCheck::Available => info!("Preset '{}' is available", cfg.preset),
        PresetCheck::Missing { suggestions } => {
            warn!("Preset '{}' not found in available presets", cfg.preset);
            if !suggestions.is_empty() {
                info!("Available General presets (first few):");
                for preset in suggestions {
                    info!("  {}", preset);
                }
            }
        }
        PresetCheck::Unknown => warn!("Could not check HandBrake presets"),
    }

    let dispatcher = Dispatcher::new(Arc::clone(&cfg), orchestrator);

    // Watch before scanning so files dropped in during startup processing are not missed
    let watcher = if args.once {
        None
    } else {
        Some(DirectoryWatcher::start(&cfg.input_dir)?)
    };

    let existing = scan::scan_existing(&cfg)?;
    if !existing.is_empty() {
        println!("\n📁 Found {} existing video file(s) in input folder", existing.len());
        println!("{}", "=".repeat(60));
        for path in &existing {
            println!("  • {}", file_name(path));
        }
        println!("{}\n", "=".repeat(60));

        for path in &existing {
            info!("Processing existing file: {}", file_name(path));
            dispatcher.dispatch(path).await?;
        }
    }

    let Some((watcher, paths)) = watcher else {
        info!("Startup files processed, exiting (--once)");
        return Ok(());
    };

    let (stop_tx, stop_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if stop_tx.send(()).is_err() {
                break;
            }
        }
    });

    info!("Watching for video files in: {}", cfg.input_dir.display());
    info!("Drop video files into the input directory to start encoding...");
    info!("Press Ctrl+C to stop");

    let result = run_watch_loop(dispatcher, paths, stop_rx).await;
    drop(watcher);
    result?;

    Ok(())
}

fn prepare_dir(name: &str, dir: &Path) -> Result<()> {
    if scan::ensure_dir(dir)? {
        info!("Created {} directory: {}", name.to_lowercase(), dir.display());
        println!("✅ Created {} directory: {}", name, dir.display());
    } else {
        info!("{} directory: {}", name, dir.display());
        println!("✅ {} directory: {}", name, dir.display());
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
