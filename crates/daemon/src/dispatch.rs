use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashSet;
use log::debug;
use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::orchestrator::ProcessOutcome;

/// Something that can process a single candidate file
#[async_trait]
pub trait FileProcessor: Send + Sync + 'static {
    async fn process(&self, path: &Path) -> Result<ProcessOutcome, WatchError>;
}

/// Canonical paths currently being processed. Safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    paths: Arc<DashSet<String>>,
}

/// Membership in an [`InFlightSet`]; the path is released when this drops.
#[derive(Debug)]
pub struct InFlightGuard {
    paths: Arc<DashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.paths.remove(&self.key);
    }
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`, or `None` if another attempt already holds it
    pub fn try_acquire(&self, path: &Path) -> Option<InFlightGuard> {
        let key = path.to_string_lossy().into_owned();
        if self.paths.insert(key.clone()) {
            Some(InFlightGuard { paths: Arc::clone(&self.paths), key })
        } else {
            None
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path.to_string_lossy().as_ref())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// What the dispatcher did with a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NotVideo,
    AlreadyInFlight,
    Processed(ProcessOutcome),
}

/// Filters and de-duplicates candidate paths before handing them to a processor
pub struct Dispatcher<P> {
    cfg: Arc<WatchConfig>,
    processor: Arc<P>,
    in_flight: InFlightSet,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            cfg: Arc::clone(&self.cfg),
            processor: Arc::clone(&self.processor),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<P: FileProcessor> Dispatcher<P> {
    pub fn new(cfg: Arc<WatchConfig>, processor: Arc<P>) -> Self {
        Self { cfg, processor, in_flight: InFlightSet::new() }
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    pub async fn dispatch(&self, path: &Path) -> Result<DispatchOutcome, WatchError> {
        if !self.cfg.is_video(path) {
            return Ok(DispatchOutcome::NotVideo);
        }

        let canonical = canonical_path(path);
        let Some(_guard) = self.in_flight.try_acquire(&canonical) else {
            debug!("Already processing, ignoring duplicate event: {}", canonical.display());
            return Ok(DispatchOutcome::AlreadyInFlight);
        };

        let outcome = self.processor.process(&canonical).await?;
        Ok(DispatchOutcome::Processed(outcome))
    }
}

/// Absolute canonical form of `path`. A path that no longer resolves is made
/// absolute without following links.
pub fn canonical_path(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(_) if path.is_absolute() => path.to_path_buf(),
        Err(_) => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}
