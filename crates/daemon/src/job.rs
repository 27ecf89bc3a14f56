use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::config::WatchConfig;

/// One encode attempt for one input file. Lives only for the attempt.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub id: String,
    pub input: PathBuf,
    /// `<output_dir>/<stem>_encoded.<ext>`
    pub output: PathBuf,
    /// `<done_dir>/<file name>`
    pub done: PathBuf,
    pub preset: String,
    pub created_at: DateTime<Utc>,
}

impl EncodeJob {
    pub fn new(cfg: &WatchConfig, input: &Path) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input: input.to_path_buf(),
            output: output_path_for(cfg, input),
            done: done_path_for(cfg, input),
            preset: cfg.preset.clone(),
            created_at: Utc::now(),
        }
    }

    /// Short id for log lines
    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }

    pub fn input_name(&self) -> String {
        display_name(&self.input)
    }

    pub fn output_name(&self) -> String {
        display_name(&self.output)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Derive the encoded artifact path for an input file
pub fn output_path_for(cfg: &WatchConfig, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = cfg
        .output_extension
        .clone()
        .or_else(|| input.extension().map(|e| e.to_string_lossy().into_owned()));

    let name = match ext {
        Some(ext) => format!("{}_encoded.{}", stem, ext),
        None => format!("{}_encoded", stem),
    };
    cfg.output_dir.join(name)
}

/// Derive where the original goes after a successful encode
pub fn done_path_for(cfg: &WatchConfig, input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => cfg.done_dir.join(name),
        None => cfg.done_dir.clone(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
