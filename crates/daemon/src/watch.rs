//! Live directory watching.
//!
//! Filesystem notifications are turned into candidate paths and each one is
//! dispatched on its own task, so a file that is still being copied never
//! holds up another. Encoder runs themselves are serialized by the
//! orchestrator.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use crate::dispatch::{DispatchOutcome, Dispatcher, FileProcessor};
use crate::error::WatchError;

/// Paths in a notification that may be newly arrived files.
///
/// Creations and moves into the directory count; for a rename reported with
/// both ends, the destination is used.
pub fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.iter().filter(|p| !p.is_dir()).cloned().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().filter(|p| !p.is_dir()).cloned().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().filter(|p| !p.is_dir()).cloned().into_iter().collect()
        }
        // Some backends cannot tell which end of a rename they saw
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|p| p.is_file()).cloned().collect()
        }
        _ => Vec::new(),
    }
}

/// Non-recursive watcher on one directory. Events stop when this is dropped.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `dir`; candidate paths arrive on the returned channel
    pub fn start(dir: &Path) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for path in candidate_paths(&event) {
                        if tx.send(path).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => error!("Watch error: {}", e),
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

type DispatchResult = Result<DispatchOutcome, WatchError>;

/// Drive `dispatcher` from `paths` until a stop request arrives on `stop`.
///
/// The first stop request ends intake and waits for running tasks; a second
/// one aborts them. A fatal error from any task aborts the rest and is returned.
pub async fn run_watch_loop<P: FileProcessor>(
    dispatcher: Dispatcher<P>,
    mut paths: mpsc::UnboundedReceiver<PathBuf>,
    mut stop: mpsc::UnboundedReceiver<()>,
) -> Result<(), WatchError> {
    let mut tasks: JoinSet<DispatchResult> = JoinSet::new();

    loop {
        tokio::select! {
            Some(()) = stop.recv() => {
                info!("Stopping folder watcher...");
                break;
            }
            next = paths.recv() => match next {
                Some(path) => {
                    debug!("Event for {}", path.display());
                    let dispatcher = dispatcher.clone();
                    tasks.spawn(async move { dispatcher.dispatch(&path).await });
                }
                None => {
                    warn!("Filesystem event stream closed");
                    break;
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(fatal) = settle(joined) {
                    tasks.abort_all();
                    return Err(fatal);
                }
            }
        }
    }
    drop(paths);

    if !tasks.is_empty() {
        info!("Waiting for {} file(s) in progress to finish", tasks.len());
    }
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(joined) => {
                    if let Err(fatal) = settle(joined) {
                        tasks.abort_all();
                        return Err(fatal);
                    }
                }
                None => break,
            },
            Some(()) = stop.recv() => {
                warn!("Second stop request, aborting {} task(s)", tasks.len());
                tasks.abort_all();
            }
        }
    }

    info!("Folder watcher stopped");
    Ok(())
}

fn settle(joined: Result<DispatchResult, JoinError>) -> Result<(), WatchError> {
    match joined {
        Ok(Ok(outcome)) => {
            debug!("Dispatch finished: {:?}", outcome);
            Ok(())
        }
        Ok(Err(fatal)) => Err(fatal),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => {
            error!("Processing task failed: {}", e);
            Ok(())
        }
    }
}
