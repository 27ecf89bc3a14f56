use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Default encoder preset
pub const DEFAULT_PRESET: &str = "Very Fast 720p30";

/// Default set of recognized video extensions
pub const DEFAULT_VIDEO_EXTENSIONS: &str = ".mp4,.avi,.mkv,.mov,.wmv,.flv,.webm,.m4v,.mpg,.mpeg";

/// Directory settings as they appear in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub done_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            done_dir: PathBuf::from("done"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingSettings {
    /// Preset name passed to `--preset`
    pub preset: String,
    /// Encoder binary (looked up on PATH when not absolute)
    pub encoder_bin: PathBuf,
    /// Leading arguments inserted before every encoder invocation
    pub encoder_args: Vec<String>,
    /// Extension for encoded artifacts; the original's extension when unset
    pub output_extension: Option<String>,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            preset: DEFAULT_PRESET.to_string(),
            encoder_bin: PathBuf::from("HandBrakeCLI"),
            encoder_args: Vec::new(),
            output_extension: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHandlingSettings {
    /// Comma-separated list, e.g. ".mp4,.mkv"
    pub video_extensions: String,
    /// Consecutive unchanged size samples required before encoding
    #[serde(alias = "stabilization_time")]
    pub stabilization_samples: u32,
    /// Seconds between size samples
    #[serde(alias = "stabilization_check_interval")]
    pub stabilization_interval_secs: u64,
}

impl Default for FileHandlingSettings {
    fn default() -> Self {
        Self {
            video_extensions: DEFAULT_VIDEO_EXTENSIONS.to_string(),
            stabilization_samples: 3,
            stabilization_interval_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { log_level: "INFO".to_string() }
    }
}

/// On-disk shape of the configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub directories: DirectorySettings,
    pub encoding: EncodingSettings,
    pub file_handling: FileHandlingSettings,
    pub logging: LoggingSettings,
}

/// Resolved, immutable configuration for one watcher run
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Watched directory
    pub input_dir: PathBuf,
    /// Destination for encoded artifacts
    pub output_dir: PathBuf,
    /// Destination for originals after a successful encode
    pub done_dir: PathBuf,
    /// Directory holding the run log
    pub log_dir: PathBuf,
    pub preset: String,
    pub encoder_bin: PathBuf,
    pub encoder_args: Vec<String>,
    pub output_extension: Option<String>,
    /// Lower-case extensions with a leading dot
    pub video_extensions: BTreeSet<String>,
    pub stabilization_samples: u32,
    pub stabilization_interval_secs: u64,
    pub log_level: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), Path::new("."))
    }
}

impl WatchConfig {
    /// Build a resolved configuration, anchoring relative directories at `root`
    pub fn from_file(file: ConfigFile, root: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

        Self {
            input_dir: resolve(file.directories.input_dir),
            output_dir: resolve(file.directories.output_dir),
            done_dir: resolve(file.directories.done_dir),
            log_dir: resolve(file.directories.log_dir),
            preset: file.encoding.preset,
            encoder_bin: file.encoding.encoder_bin,
            encoder_args: file.encoding.encoder_args,
            output_extension: file
                .encoding
                .output_extension
                .map(|e| e.trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty()),
            video_extensions: parse_extensions(&file.file_handling.video_extensions),
            stabilization_samples: file.file_handling.stabilization_samples,
            stabilization_interval_secs: file.file_handling.stabilization_interval_secs,
            log_level: file.logging.log_level,
        }
    }

    /// Configuration rooted at `root` with every setting at its default
    pub fn with_root(root: &Path) -> Self {
        Self::from_file(ConfigFile::default(), root)
    }

    /// Load configuration from a file, falling back to defaults.
    ///
    /// A missing file is not an error. A file that cannot be read or parsed is
    /// reported on the console and the defaults are used instead. Relative
    /// directories are resolved against the config file's directory, or the
    /// current directory when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;

        let Some(config_path) = path else {
            return Ok(Self::with_root(&cwd));
        };

        let root = match config_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => cwd.clone(),
        };
        let root = if root.is_absolute() { root } else { cwd.join(root) };

        if !config_path.exists() {
            println!("Config file not found: {}", config_path.display());
            println!("Using default configuration");
            return Ok(Self::with_root(&root));
        }

        match Self::read_file(config_path) {
            Ok(file) => Ok(Self::from_file(file, &root)),
            Err(e) => {
                println!("Warning: Could not read config file: {:#}", e);
                println!("Using default configuration");
                Ok(Self::with_root(&root))
            }
        }
    }

    fn read_file(config_path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        // TOML by extension, JSON otherwise
        if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))
        }
    }

    /// Whether `path` carries one of the recognized video extensions
    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.video_extensions.contains(&format!(".{}", ext.to_lowercase())))
            .unwrap_or(false)
    }

    pub fn stabilization_interval(&self) -> Duration {
        Duration::from_secs(self.stabilization_interval_secs)
    }

    /// Log level from config; unknown names fall back to INFO
    pub fn log_level_filter(&self) -> LevelFilter {
        match self.log_level.trim().to_uppercase().as_str() {
            "TRACE" => LevelFilter::Trace,
            "DEBUG" => LevelFilter::Debug,
            "INFO" => LevelFilter::Info,
            "WARN" | "WARNING" => LevelFilter::Warn,
            "ERROR" | "CRITICAL" => LevelFilter::Error,
            "OFF" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }
}

fn parse_extensions(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| if s.starts_with('.') { s } else { format!(".{}", s) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = WatchConfig::with_root(Path::new("/srv/watch"));
        assert_eq!(cfg.input_dir, PathBuf::from("/srv/watch/input"));
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/watch/output"));
        assert_eq!(cfg.done_dir, PathBuf::from("/srv/watch/done"));
        assert_eq!(cfg.log_dir, PathBuf::from("/srv/watch/logs"));
        assert_eq!(cfg.preset, "Very Fast 720p30");
        assert_eq!(cfg.stabilization_samples, 3);
        assert_eq!(cfg.stabilization_interval(), Duration::from_secs(1));
        assert_eq!(cfg.log_level_filter(), LevelFilter::Info);
        assert_eq!(cfg.video_extensions.len(), 10);
        assert!(cfg.output_extension.is_none());
    }

    #[test]
    fn test_is_video_case_insensitive() {
        let cfg = WatchConfig::default();
        assert!(cfg.is_video(Path::new("movie.mkv")));
        assert!(cfg.is_video(Path::new("MOVIE.MKV")));
        assert!(cfg.is_video(Path::new("/a/b/clip.mpeg")));
        assert!(!cfg.is_video(Path::new("notes.txt")));
        assert!(!cfg.is_video(Path::new("no_extension")));
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        let exts = parse_extensions(" .MP4, mkv ,, .Mov");
        let expected: BTreeSet<String> =
            [".mp4", ".mkv", ".mov"].iter().map(|s| s.to_string()).collect();
        assert_eq!(exts, expected);
    }

    #[test]
    fn test_load_toml_partial_with_fallbacks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[directories]
input_dir = "incoming"
done_dir = "/var/done"

[encoding]
preset = "Fast 1080p30"
output_extension = ".mp4"

[file_handling]
stabilization_samples = 5

[logging]
log_level = "debug"
"#,
        )
        .unwrap();

        let cfg = WatchConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.input_dir, dir.path().join("incoming"));
        assert_eq!(cfg.output_dir, dir.path().join("output"));
        assert_eq!(cfg.done_dir, PathBuf::from("/var/done"));
        assert_eq!(cfg.preset, "Fast 1080p30");
        assert_eq!(cfg.output_extension.as_deref(), Some("mp4"));
        assert_eq!(cfg.stabilization_samples, 5);
        assert_eq!(cfg.stabilization_interval_secs, 1);
        assert_eq!(cfg.log_level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_legacy_stabilization_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[file_handling]
stabilization_time = 4
stabilization_check_interval = 2
"#,
        )
        .unwrap();

        let cfg = WatchConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.stabilization_samples, 4);
        assert_eq!(cfg.stabilization_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"file_handling": {"video_extensions": ".mkv"}, "encoding": {"encoder_bin": "/opt/hb/HandBrakeCLI"}}"#,
        )
        .unwrap();

        let cfg = WatchConfig::load(Some(&path)).unwrap();
        assert!(cfg.is_video(Path::new("a.mkv")));
        assert!(!cfg.is_video(Path::new("a.mp4")));
        assert_eq!(cfg.encoder_bin, PathBuf::from("/opt/hb/HandBrakeCLI"));
    }

    #[test]
    fn test_load_invalid_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not valid toml").unwrap();

        let cfg = WatchConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.preset, DEFAULT_PRESET);
        assert_eq!(cfg.input_dir, dir.path().join("input"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = WatchConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.preset, DEFAULT_PRESET);
        assert_eq!(cfg.done_dir, dir.path().join("done"));
    }

    #[test]
    fn test_unknown_log_level_is_info() {
        let mut cfg = WatchConfig::default();
        cfg.log_level = "chatty".to_string();
        assert_eq!(cfg.log_level_filter(), LevelFilter::Info);
        cfg.log_level = "warning".to_string();
        assert_eq!(cfg.log_level_filter(), LevelFilter::Warn);
    }
}
