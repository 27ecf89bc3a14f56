use std::path::Path;
use std::sync::Arc;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use crate::config::WatchConfig;
use crate::dispatch::FileProcessor;
use crate::encoder::Encoder;
use crate::error::{EncodeFailure, WatchError};
use crate::job::EncodeJob;
use crate::report::Reporter;
use crate::stability::wait_until_stable;

/// How one processing attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not a recognized video file
    Ignored,
    /// The file disappeared before encoding could start
    Vanished,
    /// Encoder succeeded; `relocated` tells whether the original reached the done directory
    Encoded { relocated: bool },
    Failed(String),
}

/// Runs the per-file pipeline: stabilize, preflight, encode, finalize.
pub struct Orchestrator {
    cfg: Arc<WatchConfig>,
    encoder: Encoder,
    reporter: Arc<dyn Reporter>,
    /// One permit: encoder runs never overlap
    encode_slot: Semaphore,
}

impl Orchestrator {
    pub fn new(cfg: Arc<WatchConfig>, reporter: Arc<dyn Reporter>) -> Self {
        let encoder = Encoder::new(&cfg);
        Self {
            cfg,
            encoder,
            reporter,
            encode_slot: Semaphore::new(1),
        }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Process one file. Only a missing encoder is returned as an error;
    /// every per-file problem is logged and reported through the outcome.
    pub async fn process(&self, path: &Path) -> Result<ProcessOutcome, WatchError> {
        if !self.cfg.is_video(path) {
            return Ok(ProcessOutcome::Ignored);
        }

        if !path.exists() {
            warn!("File does not exist: {}", path.display());
            return Ok(ProcessOutcome::Vanished);
        }

        wait_until_stable(
            path,
            self.cfg.stabilization_interval(),
            self.cfg.stabilization_samples,
        )
        .await;

        let _permit = match self.encode_slot.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Ok(ProcessOutcome::Failed("encoder slot closed".to_string())),
        };

        if let Err(e) = self.encoder.probe().await {
            error!("Encoder not available, cannot process {}: {}", path.display(), e);
            return Err(e);
        }

        let job = EncodeJob::new(&self.cfg, path);
        info!("Job {}: Starting encoding: {}", job.short_id(), job.input_name());
        self.reporter.encode_started(&job);

        match self.encoder.run(&job, self.reporter.as_ref()).await {
            Ok(()) => Ok(self.finalize_success(&job).await),
            Err(EncodeFailure::InputMissing(p)) => {
                error!("Job {}: Input file not found: {}", job.short_id(), p.display());
                self.reporter.input_missing(&job);
                Ok(ProcessOutcome::Failed(format!("input file not found: {}", p.display())))
            }
            Err(failure) => {
                error!("Job {}: Encoding failed for {}: {}", job.short_id(), job.input_name(), failure);
                self.reporter.encode_failed(&job, &failure.to_string());
                Ok(ProcessOutcome::Failed(failure.to_string()))
            }
        }
    }

    async fn finalize_success(&self, job: &EncodeJob) -> ProcessOutcome {
        info!(
            "Job {}: Encoding completed successfully: {} ({}s)",
            job.short_id(),
            job.input_name(),
            job.elapsed().num_seconds()
        );
        self.reporter.encode_succeeded(job);

        if !job.input.exists() {
            warn!("Job {}: Input file disappeared: {}", job.short_id(), job.input.display());
            self.reporter
                .relocation_skipped(job, "Original file not found, cannot move to done folder");
            return ProcessOutcome::Encoded { relocated: false };
        }

        match relocate(&job.input, &job.done).await {
            Ok(()) => {
                info!("Job {}: Original file moved to: {}", job.short_id(), job.done.display());
                self.reporter.relocated(job);
                ProcessOutcome::Encoded { relocated: true }
            }
            Err(e) => {
                warn!("Job {}: Failed to move original file: {:#}", job.short_id(), e);
                self.reporter
                    .relocation_skipped(job, &format!("Could not move original file: {:#}", e));
                ProcessOutcome::Encoded { relocated: false }
            }
        }
    }
}

#[async_trait]
impl FileProcessor for Orchestrator {
    async fn process(&self, path: &Path) -> Result<ProcessOutcome, WatchError> {
        Orchestrator::process(self, path).await
    }
}

/// Move `from` to `to`, creating the destination directory. Falls back to
/// copy-and-remove when a plain rename is not possible (e.g. across devices).
pub async fn relocate(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create done directory: {}", parent.display()))?;
    }

    if let Err(rename_err) = tokio::fs::rename(from, to).await {
        tokio::fs::copy(from, to).await.with_context(|| {
            format!("Failed to move {} to {} ({})", from.display(), to.display(), rename_err)
        })?;
        tokio::fs::remove_file(from)
            .await
            .with_context(|| format!("Copied but failed to remove original: {}", from.display()))?;
    }
    Ok(())
}
