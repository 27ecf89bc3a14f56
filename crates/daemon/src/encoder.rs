use std::path::PathBuf;
use std::process::Stdio;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use crate::config::WatchConfig;
use crate::error::{EncodeFailure, WatchError};
use crate::job::EncodeJob;
use crate::progress::{classify_line, LineKind, ProgressTracker};
use crate::report::Reporter;

/// Maximum number of alternative presets listed when the configured one is missing
const MAX_PRESET_SUGGESTIONS: usize = 10;

/// First line of the encoder's `--version` output, e.g. "HandBrake 1.7.3"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderVersion(pub String);

/// Result of looking the configured preset up in the encoder's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetCheck {
    Available,
    Missing { suggestions: Vec<String> },
    /// The catalog could not be queried
    Unknown,
}

/// Handle on the external encoder binary
#[derive(Debug, Clone)]
pub struct Encoder {
    pub bin: PathBuf,
    pub leading_args: Vec<String>,
}

impl Encoder {
    pub fn new(cfg: &WatchConfig) -> Self {
        Self {
            bin: cfg.encoder_bin.clone(),
            leading_args: cfg.encoder_args.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.leading_args);
        cmd.stdin(Stdio::null());
        cmd
    }

    fn unavailable(&self, reason: impl Into<String>) -> WatchError {
        WatchError::EncoderUnavailable { bin: self.bin.clone(), reason: reason.into() }
    }

    /// Check that the encoder can be invoked at all
    pub async fn probe(&self) -> Result<EncoderVersion, WatchError> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(self.unavailable(format!("version query exited with {}", output.status)));
        }

        // HandBrakeCLI prints its banner on stdout, but older builds used stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("unknown version")
            .to_string();

        Ok(EncoderVersion(version))
    }

    /// Look for `preset` in the encoder's preset catalog. Informational only.
    pub async fn check_preset(&self, preset: &str) -> PresetCheck {
        let output = match self.command().arg("--preset-list").output().await {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                warn!("Could not check encoder presets: exited with {}", o.status);
                return PresetCheck::Unknown;
            }
            Err(e) => {
                warn!("Could not check encoder presets: {}", e);
                return PresetCheck::Unknown;
            }
        };

        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&output.stderr));

        match_preset(&listing, preset)
    }

    /// Run one encode, streaming progress to `reporter`.
    ///
    /// On any failure the partial output at `job.output` is removed before returning.
    pub async fn run(&self, job: &EncodeJob, reporter: &dyn Reporter) -> Result<(), EncodeFailure> {
        if !job.input.exists() {
            return Err(EncodeFailure::InputMissing(job.input.clone()));
        }

        let result = self.run_child(job, reporter).await;
        if result.is_err() {
            remove_partial_output(job).await;
        }
        result
    }

    async fn run_child(&self, job: &EncodeJob, reporter: &dyn Reporter) -> Result<(), EncodeFailure> {
        let mut cmd = self.command();
        cmd.arg("--input")
            .arg(&job.input)
            .arg("--output")
            .arg(&job.output)
            .arg("--preset")
            .arg(&job.preset)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "Job {}: Encoding command: {} {} --input {} --output {} --preset {}",
            job.short_id(),
            self.bin.display(),
            self.leading_args.join(" "),
            job.input.display(),
            job.output.display(),
            job.preset
        );

        let mut child = cmd.spawn().map_err(EncodeFailure::Spawn)?;

        // Merge stdout and stderr into a single line stream
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        let mut tracker = ProgressTracker::new();
        while let Some(line) = rx.recv().await {
            match classify_line(&line) {
                LineKind::Progress(sample) => {
                    if tracker.offer(&sample) {
                        reporter.progress(job, &sample);
                    }
                }
                LineKind::Diagnostic => debug!("Job {}: {}", job.short_id(), line.trim()),
                LineKind::Malformed | LineKind::Other => {}
            }
        }

        for reader in readers {
            if let Err(e) = reader.await {
                warn!("Job {}: output reader task failed: {}", job.short_id(), e);
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(EncodeFailure::ExitStatus(status.code()))
        }
    }
}

/// Compare the trimmed catalog lines against `preset`
pub fn match_preset(listing: &str, preset: &str) -> PresetCheck {
    if listing.lines().any(|l| l.trim() == preset) {
        return PresetCheck::Available;
    }

    let mut suggestions = Vec::new();
    let mut in_general = false;
    for line in listing.lines().map(str::trim) {
        if line == "General/" {
            in_general = true;
            continue;
        }
        if !in_general {
            continue;
        }
        if line.ends_with('/') || suggestions.len() >= MAX_PRESET_SUGGESTIONS {
            break;
        }
        if !line.is_empty() {
            suggestions.push(line.to_string());
        }
    }

    PresetCheck::Missing { suggestions }
}

/// Best-effort removal of a partial encode artifact
pub async fn remove_partial_output(job: &EncodeJob) {
    match tokio::fs::remove_file(&job.output).await {
        Ok(()) => info!("Job {}: Cleaned up partial output file: {}", job.short_id(), job.output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(
            "Job {}: Failed to clean up output file {}: {}",
            job.short_id(),
            job.output.display(),
            e
        ),
    }
}

/// Forward every line of `reader` to `tx`. Both `\n` and `\r` end a line
/// because the encoder redraws its progress line with carriage returns.
pub async fn forward_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Stopped reading encoder output: {}", e);
                break;
            }
        };

        for &b in &buf[..n] {
            if b == b'\n' || b == b'\r' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            } else {
                pending.push(b);
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
    }
}
