use std::path::PathBuf;
use anyhow::{Context, Result};
use walkdir::WalkDir;
use crate::config::WatchConfig;
use log::{debug, info, warn};

/// List video files already sitting in the input directory, sorted by name.
///
/// Only direct children are considered; subdirectories are not descended into.
pub fn scan_existing(cfg: &WatchConfig) -> Result<Vec<PathBuf>> {
    if !cfg.input_dir.exists() {
        warn!("Input directory does not exist: {}", cfg.input_dir.display());
        return Ok(Vec::new());
    }

    info!("Scanning input directory for existing files...");

    let mut found = Vec::new();
    let walker = WalkDir::new(&cfg.input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if !cfg.is_video(path) {
            debug!("Skipping non-video file: {}", path.display());
            continue;
        }
        found.push(path.to_path_buf());
    }

    if found.is_empty() {
        info!("No existing video files found in input directory");
    } else {
        info!("Found {} existing video file(s) to process", found.len());
    }
    Ok(found)
}

/// Create a directory if needed, returning whether it was created
pub fn ensure_dir(dir: &std::path::Path) -> Result<bool> {
    if dir.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        let cfg = WatchConfig::with_root(dir.path());
        std::fs::create_dir_all(&cfg.input_dir).unwrap();
        std::fs::write(cfg.input_dir.join("movie.mkv"), b"x").unwrap();
        std::fs::write(cfg.input_dir.join("notes.txt"), b"x").unwrap();

        let found = scan_existing(&cfg).unwrap();
        assert_eq!(found, vec![cfg.input_dir.join("movie.mkv")]);
    }

    #[test]
    fn test_scan_is_not_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let cfg = WatchConfig::with_root(dir.path());
        let nested = cfg.input_dir.join("season1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("episode.mkv"), b"x").unwrap();
        std::fs::write(cfg.input_dir.join("b.MP4"), b"x").unwrap();
        std::fs::write(cfg.input_dir.join("a.avi"), b"x").unwrap();
        // A directory that merely looks like a video
        std::fs::create_dir_all(cfg.input_dir.join("folder.mkv")).unwrap();

        let found = scan_existing(&cfg).unwrap();
        assert_eq!(found, vec![cfg.input_dir.join("a.avi"), cfg.input_dir.join("b.MP4")]);
    }

    #[test]
    fn test_scan_missing_input_dir() {
        let dir = TempDir::new().unwrap();
        let cfg = WatchConfig::with_root(dir.path());
        assert!(scan_existing(&cfg).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_dir() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b");
        assert!(ensure_dir(&target).unwrap());
        assert!(!ensure_dir(&target).unwrap());
        assert!(target.is_dir());
    }
}
