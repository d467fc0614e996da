//! File watcher
//!
//! Walks the project tree once, attaches a non-recursive subscription per
//! directory, and forwards filtered change events over a channel. Two
//! backends produce the same event shape: native OS notifications
//! (`notify::RecommendedWatcher`) and a polling scanner
//! (`notify::PollWatcher`, period `build.poll_interval`).
//!
//! Known limitation: directories created after startup are not attached.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::Config;
use crate::error::{ZenoError, ZenoResult};
use crate::filter::PathFilter;
use crate::logger::Logger;

/// What happened to a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// A single accepted file-system change
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

enum Backend {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

impl Backend {
    fn watch_dir(&mut self, dir: &std::path::Path) -> Result<(), notify::Error> {
        match self {
            Backend::Native(w) => w.watch(dir, RecursiveMode::NonRecursive),
            Backend::Poll(w) => w.watch(dir, RecursiveMode::NonRecursive),
        }
    }
}

/// Live watch session. Dropping (or calling [`FileWatcher::stop`]) cancels
/// all subscriptions; the event channel then disconnects.
pub struct FileWatcher {
    backend: Option<Backend>,
}

impl FileWatcher {
    /// Attach subscriptions under `config.root` and return the watcher
    /// handle plus the receiving end of the event stream.
    pub fn spawn(
        config: &Config,
        filter: PathFilter,
        logger: Logger,
    ) -> ZenoResult<(Self, Receiver<ChangeEvent>)> {
        let root = config.root_path();
        if !root.is_dir() {
            return Err(ZenoError::RootNotFound { path: root });
        }

        let (tx, rx) = channel();
        let handler = event_handler(tx, filter.clone());

        let mut backend = if config.build.poll {
            let poll_config = notify::Config::default()
                .with_poll_interval(Duration::from_millis(config.build.poll_interval));
            Backend::Poll(PollWatcher::new(handler, poll_config)?)
        } else {
            Backend::Native(RecommendedWatcher::new(handler, notify::Config::default())?)
        };

        for dir in collect_watch_dirs(&root, &filter, &logger) {
            if let Err(err) = backend.watch_dir(&dir) {
                logger.warn(&format!("Could not watch {}: {err}", dir.display()));
            }
        }

        Ok((
            Self {
                backend: Some(backend),
            },
            rx,
        ))
    }

    /// Cancel all subscriptions and release OS resources; idempotent
    pub fn stop(&mut self) {
        self.backend = None;
    }
}

/// Adapt raw backend events into filtered [`ChangeEvent`]s
fn event_handler(
    tx: Sender<ChangeEvent>,
    filter: PathFilter,
) -> impl Fn(Result<Event, notify::Error>) + Send + 'static {
    move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return,
        };
        let Some(kind) = map_kind(&event.kind) else {
            return;
        };
        for path in event.paths {
            if filter.should_watch(&path) {
                let _ = tx.send(ChangeEvent { path, kind });
            }
        }
    }
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// Breadth-first walk collecting the root and every non-excluded directory.
/// Per-directory read errors are warnings; the directory is skipped.
fn collect_watch_dirs(root: &std::path::Path, filter: &PathFilter, logger: &Logger) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        dirs.push(dir.clone());

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                logger.warn(&format!("Could not read {}: {err}", dir.display()));
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && !filter.is_excluded_dir(&path) {
                queue.push_back(path);
            }
        }
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.root = root.to_string_lossy().into_owned();
        config.build.include_ext = vec!["txt".to_string()];
        config
    }

    #[test]
    fn test_collect_watch_dirs_prunes_excluded() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib/src")).unwrap();
        fs::create_dir_all(dir.path().join("tmp")).unwrap();
        fs::create_dir_all(dir.path().join("build/ios")).unwrap();

        let mut config = test_config(dir.path());
        config.build.exclude_dir = vec!["build".to_string()];
        let filter = PathFilter::new(&config).unwrap();

        let dirs = collect_watch_dirs(&config.root_path(), &filter, &Logger::default());

        assert!(dirs.contains(&dir.path().to_path_buf()));
        assert!(dirs.contains(&dir.path().join("lib")));
        assert!(dirs.contains(&dir.path().join("lib/src")));
        assert!(!dirs.contains(&dir.path().join("tmp")));
        assert!(!dirs.contains(&dir.path().join("build")));
        assert!(!dirs.contains(&dir.path().join("build/ios")));
    }

    #[test]
    fn test_spawn_missing_root_fails() {
        let mut config = Config::default();
        config.root = "/definitely/not/here".to_string();
        let filter = PathFilter::new(&config).unwrap();

        let result = FileWatcher::spawn(&config, filter, Logger::default());
        assert!(matches!(result, Err(ZenoError::RootNotFound { .. })));
    }

    #[test]
    fn test_watcher_emits_filtered_events() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let filter = PathFilter::new(&config).unwrap();

        let (mut watcher, rx) = FileWatcher::spawn(&config, filter, Logger::default()).unwrap();

        // Ignored extension first: must not produce an event
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::write(dir.path().join("data.txt"), "watched").unwrap();

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("expected an event for data.txt");
        assert!(event.path.ends_with("data.txt"), "got {:?}", event.path);

        watcher.stop();
    }

    #[test]
    fn test_poll_backend_emits_events() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.build.poll = true;
        config.build.poll_interval = 50;
        let filter = PathFilter::new(&config).unwrap();

        let (mut watcher, rx) = FileWatcher::spawn(&config, filter, Logger::default()).unwrap();

        fs::write(dir.path().join("data.txt"), "watched").unwrap();

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("expected an event from the poll backend");
        assert!(event.path.ends_with("data.txt"), "got {:?}", event.path);

        watcher.stop();
        // Idempotent
        watcher.stop();
    }

    #[test]
    fn test_stop_disconnects_channel() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let filter = PathFilter::new(&config).unwrap();

        let (mut watcher, rx) = FileWatcher::spawn(&config, filter, Logger::default()).unwrap();
        watcher.stop();

        // Once the backend is gone the sender side is dropped
        match rx.recv_timeout(Duration::from_secs(2)) {
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
    }
}
