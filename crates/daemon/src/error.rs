use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the whole watch session
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("encoder not available at {bin}: {reason}")]
    EncoderUnavailable { bin: PathBuf, reason: String },
}

/// Reasons a single file's encode did not succeed. None of these stop the watcher.
#[derive(Debug, Error)]
pub enum EncodeFailure {
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("failed to launch encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("encoder exited with status {}", describe_exit(.0))]
    ExitStatus(Option<i32>),

    #[error("i/o error while encoding: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by signal)".to_string(),
    }
}
