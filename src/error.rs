//! Error types for Zeno
//!
//! Uses `thiserror` for library errors; the binary wraps them with `anyhow`
//! at the dispatch boundary.
//!
//! Error messages include:
//! - Clear description of what went wrong
//! - Suggestion for how to fix it (when possible)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Zeno operations
pub type ZenoResult<T> = Result<T, ZenoError>;

/// Main error type for Zeno operations
#[derive(Error, Debug)]
pub enum ZenoError {
    /// No config file in the working directory
    #[error("no config file found in {dir}\n  → Fix: Run `zeno init` to scaffold a default zeno.yml")]
    ConfigNotFound { dir: PathBuf },

    /// Config file exists but does not parse
    #[error("invalid config in {file}: {message}")]
    InvalidConfig { file: PathBuf, message: String },

    /// An entry in build.exclude_regex is not a valid pattern
    #[error("invalid exclude_regex pattern '{pattern}': {message}\n  → Fix: Adjust the pattern in zeno.yml")]
    InvalidExcludeRegex { pattern: String, message: String },

    /// Watch root does not exist
    #[error("watch root not found: {path}\n  → Fix: Check the `root` setting in zeno.yml")]
    RootNotFound { path: PathBuf },

    /// The binary the supervisor should spawn is missing
    #[error("binary not found: {path}\n  → Fix: Check that `build.cmd` writes the path named by `build.bin`")]
    BinaryMissing { path: PathBuf },

    /// Spawning a process failed at the OS level
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A swap was requested while no child is supervised
    #[error("no running process to swap")]
    NoRunningProcess,

    /// Engine started twice
    #[error("engine is already running")]
    AlreadyRunning,

    /// `build.cmd` is empty or whitespace
    #[error("build command is empty\n  → Fix: Set `build.cmd` in zeno.yml")]
    EmptyBuildCommand,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Underlying file-watcher backend error
    #[error("watcher error: {0}")]
    Watch(String),
}

impl From<notify::Error> for ZenoError {
    fn from(err: notify::Error) -> Self {
        ZenoError::Watch(err.to_string())
    }
}
