use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use crate::config::WatchConfig;

/// Name of the run log inside `log_dir`
pub const LOG_FILE_NAME: &str = "handbrake_watcher.log";

/// Writes every record to both the log file and standard output
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        io::stdout().flush()
    }
}

/// Install the global logger. `RUST_LOG` overrides the configured level;
/// `verbose` forces debug output.
pub fn init_logging(cfg: &WatchConfig, verbose: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(&cfg.log_dir)
        .with_context(|| format!("Failed to create log directory: {}", cfg.log_dir.display()))?;

    let log_path = cfg.log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let level = if verbose { LevelFilter::Debug } else { cfg.log_level_filter() };

    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()
        .context("Failed to initialize logger")?;

    Ok(log_path)
}
