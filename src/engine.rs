//! Reload engine
//!
//! The coordinator: drives watcher → builder → supervisor through a
//! debounce window with at most one reload in flight. All engine state is
//! mutated on the thread running [`Engine::run`]; the shared `running`
//! flag is the only cross-thread handle, flipped by the signal handler to
//! request a graceful stop.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::builder::Builder;
use crate::config::Config;
use crate::error::{ZenoError, ZenoResult};
use crate::filter::PathFilter;
use crate::logger::Logger;
use crate::supervisor::Supervisor;
use crate::watcher::{ChangeEvent, FileWatcher};

/// Event channel polling cadence while idle
const EVENT_POLL_MS: u64 = 50;

pub struct Engine {
    config: Config,
    logger: Logger,
    builder: Builder,
    supervisor: Supervisor,
    running: Arc<AtomicBool>,
    started: bool,
    reloading: bool,
    pending: HashSet<String>,
    last_change: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config, logger: Logger, running: Arc<AtomicBool>) -> Self {
        let builder = Builder::new(config.clone(), logger.clone());
        let supervisor = Supervisor::new(config.clone(), logger.clone());
        Self {
            config,
            logger,
            builder,
            supervisor,
            running,
            started: false,
            reloading: false,
            pending: HashSet::new(),
            last_change: None,
        }
    }

    /// Start sequence and event loop. Blocks until the `running` flag is
    /// cleared (signal handler) or the watcher channel disconnects, then
    /// performs the stop sequence.
    ///
    /// An initial build failure is not fatal: the engine keeps watching so
    /// the operator can read the error, but no child is supervised until
    /// the next restart of `zeno run` itself.
    pub fn run(&mut self) -> ZenoResult<()> {
        if self.started {
            return Err(ZenoError::AlreadyRunning);
        }
        self.started = true;
        self.running.store(true, Ordering::SeqCst);

        // Validate the config before touching the file system or spawning
        // anything: a bad exclude_regex or missing root fails here, not
        // after a build has already run
        let filter = PathFilter::new(&self.config)?;
        let root = self.config.root_path();
        if !root.is_dir() {
            return Err(ZenoError::RootNotFound { path: root });
        }

        std::fs::create_dir_all(self.config.tmp_path())?;

        self.run_hooks(&self.config.build.pre_cmd);

        let build = self.builder.build_initial();
        if build.success {
            self.logger.info("Initial build successful");
            self.run_hooks(&self.config.build.post_cmd);
            self.supervisor.start_initial()?;
        } else {
            self.logger.error("Initial build failed");
        }

        let (mut watcher, events) =
            FileWatcher::spawn(&self.config, filter, self.logger.clone())?;
        self.logger
            .info(&format!("Watching {} for changes", self.config.root));

        self.event_loop(&events);

        self.shutdown(&mut watcher);
        Ok(())
    }

    fn event_loop(&mut self, events: &Receiver<ChangeEvent>) {
        while self.running.load(Ordering::SeqCst) {
            match events.recv_timeout(Duration::from_millis(EVENT_POLL_MS)) {
                Ok(event) => self.on_file_changed(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.debounce_elapsed() {
                self.reload_cycle(events);
            }
        }
    }

    /// Record an accepted change and re-arm the debounce window
    fn on_file_changed(&mut self, event: ChangeEvent) {
        if !self.running.load(Ordering::SeqCst) || self.reloading {
            return;
        }

        let relative = self.relative_display(&event.path);
        self.logger
            .detail(&format!("Change detected: {relative} ({})", event.kind));
        self.pending.insert(relative);
        self.last_change = Some(Instant::now());
    }

    /// The debounce timer "fires" once `build.delay` has passed since the
    /// last accepted event with changes still pending
    fn debounce_elapsed(&self) -> bool {
        match self.last_change {
            Some(last) => {
                !self.pending.is_empty()
                    && last.elapsed() >= Duration::from_millis(self.config.build.delay)
            }
            None => false,
        }
    }

    /// One reload cycle: drain the pending set, rebuild to the staging
    /// path, swap and restart. Exactly one cycle is in flight at a time;
    /// events arriving meanwhile are dropped, not queued — the operator
    /// saves again to trigger another cycle.
    fn reload_cycle(&mut self, events: &Receiver<ChangeEvent>) {
        if self.pending.is_empty() || self.reloading {
            return;
        }

        let mut changes: Vec<String> = self.pending.drain().collect();
        changes.sort();
        self.last_change = None;

        if self.config.screen.clear_on_rebuild {
            clear_screen(self.config.screen.keep_scroll);
        }

        self.reloading = true;
        let started = Instant::now();
        self.logger.info(&format!(
            "Hot reloading due to changes in {}",
            changes.join(", ")
        ));
        self.run_cycle(started);
        self.reloading = false;

        while events.try_recv().is_ok() {}
    }

    fn run_cycle(&mut self, started: Instant) {
        self.run_hooks(&self.config.build.pre_cmd);

        let build = self.builder.rebuild();
        if !build.success {
            if self.config.build.stop_on_error {
                self.logger
                    .error("Build failed, fix the error before the next reload");
            } else {
                self.logger.error("Build failed");
            }
            return;
        }

        self.run_hooks(&self.config.build.post_cmd);

        if self.supervisor.swap_and_restart(&self.config.staging_path()) {
            self.logger.info(&format!(
                "Hot reload done in {}ms",
                started.elapsed().as_millis()
            ));
        }
    }

    /// Run a command list sequentially in the project root; failures are
    /// logged, never fatal
    fn run_hooks(&self, cmds: &[String]) {
        for cmd in cmds {
            let mut parts = cmd.split_whitespace();
            let Some(program) = parts.next() else {
                continue;
            };
            let status = Command::new(program)
                .args(parts)
                .current_dir(&self.config.root)
                .status();
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => self
                    .logger
                    .warn(&format!("Command '{cmd}' exited with {status}")),
                Err(err) => self.logger.warn(&format!("Command '{cmd}' failed: {err}")),
            }
        }
    }

    /// Stop sequence; safe to reach only once per run but tolerant of
    /// partial startup
    fn shutdown(&mut self, watcher: &mut FileWatcher) {
        self.logger.info("Shutting down");
        self.pending.clear();
        self.last_change = None;

        watcher.stop();
        self.supervisor.stop();

        if self.config.misc.clean_on_exit {
            let tmp = self.config.tmp_path();
            if tmp.exists() {
                if let Err(err) = std::fs::remove_dir_all(&tmp) {
                    self.logger
                        .warn(&format!("Could not remove {}: {err}", tmp.display()));
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// Change paths are reported relative to the watch root
    fn relative_display(&self, path: &Path) -> String {
        let root = self.config.root_path();
        if let Ok(relative) = path.strip_prefix(&root) {
            return relative.display().to_string();
        }
        if let Ok(canonical) = root.canonicalize() {
            if let Ok(relative) = path.strip_prefix(&canonical) {
                return relative.display().to_string();
            }
        }
        path.display().to_string()
    }
}

/// `ESC[2J` clears the screen; unless scrollback is kept the cursor is
/// also homed with `ESC[H`
fn clear_screen(keep_scroll: bool) {
    if keep_scroll {
        print!("\x1b[2J");
    } else {
        print!("\x1b[2J\x1b[H");
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ChangeKind;
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    fn engine_for(root: &Path, f: impl FnOnce(&mut Config)) -> Engine {
        let mut config = Config::default();
        config.root = root.to_string_lossy().into_owned();
        config.build.include_ext = vec![];
        config.build.delay = 60;
        f(&mut config);
        Engine::new(config, Logger::default(), Arc::new(AtomicBool::new(true)))
    }

    fn change(root: &Path, name: &str) -> ChangeEvent {
        ChangeEvent {
            path: root.join(name),
            kind: ChangeKind::Modified,
        }
    }

    #[test]
    fn test_run_rejects_second_start() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});
        engine.started = true;

        let err = engine.run().unwrap_err();
        assert!(matches!(err, ZenoError::AlreadyRunning));
    }

    #[test]
    fn test_run_fails_fast_on_bad_regex() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |c| {
            c.build.exclude_regex = vec!["[unclosed".to_string()];
        });

        let err = engine.run().unwrap_err();
        assert!(matches!(err, ZenoError::InvalidExcludeRegex { .. }));

        // Validation happens before the tmp dir is created or the build
        // command runs
        assert!(!dir.path().join("tmp").exists());
    }

    #[test]
    fn test_run_fails_fast_on_missing_root() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |c| {
            c.root = "/definitely/not/here".to_string();
        });

        let err = engine.run().unwrap_err();
        assert!(matches!(err, ZenoError::RootNotFound { .. }));
    }

    #[test]
    fn test_debounce_waits_for_quiet_window() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});

        engine.on_file_changed(change(dir.path(), "a.txt"));
        assert!(!engine.debounce_elapsed());

        std::thread::sleep(Duration::from_millis(80));
        assert!(engine.debounce_elapsed());
    }

    #[test]
    fn test_new_event_rearms_debounce() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |c| c.build.delay = 200);

        engine.on_file_changed(change(dir.path(), "a.txt"));
        std::thread::sleep(Duration::from_millis(120));
        engine.on_file_changed(change(dir.path(), "b.txt"));

        // The second event pushed the deadline out
        std::thread::sleep(Duration::from_millis(60));
        assert!(!engine.debounce_elapsed());

        std::thread::sleep(Duration::from_millis(180));
        assert!(engine.debounce_elapsed());
    }

    #[test]
    fn test_burst_collapses_into_one_pending_set() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});

        engine.on_file_changed(change(dir.path(), "a.txt"));
        engine.on_file_changed(change(dir.path(), "a.txt"));
        engine.on_file_changed(change(dir.path(), "b.txt"));

        assert_eq!(engine.pending.len(), 2);
    }

    #[test]
    fn test_events_dropped_while_reloading() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});
        engine.reloading = true;

        engine.on_file_changed(change(dir.path(), "a.txt"));
        assert!(engine.pending.is_empty());
        assert!(engine.last_change.is_none());
    }

    #[test]
    fn test_events_dropped_when_not_running() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});
        engine.running.store(false, Ordering::SeqCst);

        engine.on_file_changed(change(dir.path(), "a.txt"));
        assert!(engine.pending.is_empty());
    }

    #[test]
    fn test_reload_cycle_drains_pending_fully() {
        let dir = tempdir().unwrap();
        // A failing build keeps the cycle short; the drain must still be
        // complete
        let mut engine = engine_for(dir.path(), |c| c.build.cmd = "false".to_string());

        engine.on_file_changed(change(dir.path(), "a.txt"));
        engine.on_file_changed(change(dir.path(), "b.txt"));

        let (_tx, rx) = channel();
        engine.reload_cycle(&rx);

        assert!(engine.pending.is_empty());
        assert!(engine.last_change.is_none());
        assert!(!engine.reloading);
    }

    #[test]
    fn test_reload_cycle_noop_without_pending() {
        let dir = tempdir().unwrap();
        let mut engine = engine_for(dir.path(), |_| {});

        let (_tx, rx) = channel();
        engine.reload_cycle(&rx);
        assert!(!engine.reloading);
    }

    #[test]
    fn test_relative_display() {
        let dir = tempdir().unwrap();
        let engine = engine_for(dir.path(), |_| {});

        assert_eq!(
            engine.relative_display(&dir.path().join("lib/main.dart")),
            "lib/main.dart"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_full_cycle_swaps_binary_and_child() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("src.sh");
        fs::write(&src, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();

        let mut engine = engine_for(dir.path(), |c| {
            c.build.cmd = "cp src.sh ./tmp/app.sh".to_string();
            c.build.bin = "./tmp/app.sh".to_string();
            c.build.delay = 30;
            c.build.kill_delay = 1500;
        });

        fs::create_dir_all(engine.config.tmp_path()).unwrap();
        assert!(engine.builder.build_initial().success);
        engine.supervisor.start_initial().unwrap();
        let old_pid = engine.supervisor.pid().unwrap();

        engine.on_file_changed(change(dir.path(), "src.sh"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(engine.debounce_elapsed());

        let (_tx, rx) = channel();
        engine.reload_cycle(&rx);

        assert!(engine.supervisor.is_running());
        assert_ne!(engine.supervisor.pid(), Some(old_pid));
        assert!(!engine.config.staging_path().exists());
        assert!(engine.config.bin_path().exists());

        engine.supervisor.stop();
    }

    #[cfg(unix)]
    #[test]
    fn test_build_failure_leaves_child_running() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let app = dir.path().join("app.sh");
        fs::write(&app, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&app, fs::Permissions::from_mode(0o755)).unwrap();

        let mut engine = engine_for(dir.path(), |c| {
            c.build.cmd = "false".to_string();
            c.build.bin = "./app.sh".to_string();
            c.build.stop_on_error = true;
        });

        engine.supervisor.start_initial().unwrap();
        let pid = engine.supervisor.pid().unwrap();

        engine.on_file_changed(change(dir.path(), "src.txt"));
        std::thread::sleep(Duration::from_millis(80));

        let (_tx, rx) = channel();
        engine.reload_cycle(&rx);

        // The failed build must not disturb the supervised child
        assert!(engine.supervisor.is_running());
        assert_eq!(engine.supervisor.pid(), Some(pid));
        engine.supervisor.stop();
    }
}
