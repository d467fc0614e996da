//! Zeno - development-time hot-reload supervisor
//!
//! Zeno watches a project tree, re-invokes the configured build command
//! when relevant files change, and swaps the running binary for the fresh
//! one with bounded downtime: edit a source file, see the process restart.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logger;
pub mod supervisor;
pub mod watcher;

// Re-exports for convenience
pub use builder::{BuildResult, Builder};
pub use config::Config;
pub use engine::Engine;
pub use error::{ZenoError, ZenoResult};
pub use filter::PathFilter;
pub use logger::Logger;
pub use supervisor::Supervisor;
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher};
