//! Process supervisor
//!
//! Owns the supervised child process: spawn, graceful stop with SIGKILL
//! escalation, and the two-phase binary swap. The engine is the sole caller
//! and serialises all mutating operations; the only concurrency here is the
//! exit observer thread and the delayed backup cleanup.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ZenoError, ZenoResult};
use crate::logger::Logger;

/// Exit observer polling cadence
const EXIT_POLL_MS: u64 = 50;

/// How long the backup binary is kept after a successful swap
const BACKUP_TTL_SECS: u64 = 30;

/// Upper bound on waiting for exit after SIGKILL
const KILL_WAIT_SECS: u64 = 5;

/// A spawned child plus the machinery observing its exit
struct ChildHandle {
    pid: u32,
    child: Arc<Mutex<Child>>,
    running: Arc<AtomicBool>,
    exit_rx: Receiver<ExitStatus>,
}

pub struct Supervisor {
    config: Config,
    logger: Logger,
    child: Option<ChildHandle>,
}

impl Supervisor {
    pub fn new(config: Config, logger: Logger) -> Self {
        Self {
            config,
            logger,
            child: None,
        }
    }

    /// Latest observed state of the current child
    pub fn is_running(&self) -> bool {
        self.child
            .as_ref()
            .map(|c| c.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Pid of the current child, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.pid)
    }

    /// Spawn the live binary with the configured args, stopping any
    /// existing child first. Fails if the binary is missing or the spawn
    /// syscall fails.
    pub fn start_initial(&mut self) -> ZenoResult<()> {
        if self.child.is_some() {
            self.stop();
        }

        let bin = self.config.bin_path();
        if !bin.is_file() {
            return Err(ZenoError::BinaryMissing { path: bin });
        }

        let child = Command::new(&bin)
            .args(&self.config.build.args)
            .current_dir(&self.config.root)
            .spawn()
            .map_err(|source| ZenoError::Spawn {
                program: bin.display().to_string(),
                source,
            })?;

        let pid = child.id();
        self.logger
            .info(&format!("Running {} (pid {pid})", self.config.build.bin));
        self.child = Some(observe(child, pid, self.logger.clone()));
        Ok(())
    }

    /// Terminate the current child, if any. Always clears the child slot;
    /// errors are logged and swallowed.
    pub fn stop(&mut self) {
        let Some(handle) = self.child.take() else {
            return;
        };
        if let Err(err) = self.terminate(&handle) {
            self.logger
                .warn(&format!("Could not stop process {}: {err}", handle.pid));
        }
    }

    /// Graceful termination with escalation: SIGTERM, then SIGKILL once
    /// `kill_delay` elapses without an observed exit.
    fn terminate(&self, handle: &ChildHandle) -> ZenoResult<()> {
        if !handle.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        send_term(handle)?;

        let kill_delay = Duration::from_millis(self.config.build.kill_delay);
        match handle.exit_rx.recv_timeout(kill_delay) {
            Ok(_) => Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                self.logger.warn(&format!(
                    "Process {} did not exit within {}ms, force killing",
                    handle.pid, self.config.build.kill_delay
                ));
                force_kill(handle);
                let _ = handle
                    .exit_rx
                    .recv_timeout(Duration::from_secs(KILL_WAIT_SECS));
                Ok(())
            }
            // Observer already reaped the child and hung up
            Err(RecvTimeoutError::Disconnected) => Ok(()),
        }
    }

    /// Promote the staging binary and restart the child.
    ///
    /// Ordering is load-bearing: terminate, back up the live binary, copy
    /// staging over live, delete staging, spawn. Returns `false` on any
    /// recoverable failure; a failure after termination re-spawns from the
    /// current live binary so the operator is not left without a process.
    pub fn swap_and_restart(&mut self, staging: &Path) -> bool {
        if self.child.is_none() {
            self.logger.warn(&ZenoError::NoRunningProcess.to_string());
            return false;
        }

        if !staging.is_file() {
            self.logger.warn(&format!(
                "Staging binary missing: {}",
                staging.display()
            ));
            self.log_dir_contents(staging.parent());
            return false;
        }

        match self.perform_swap(staging) {
            Ok(()) => true,
            Err(err) => {
                self.logger.error(&format!("Swap failed: {err}"));
                self.recover();
                false
            }
        }
    }

    fn perform_swap(&mut self, staging: &Path) -> ZenoResult<()> {
        self.stop();

        let live = self.config.bin_path();
        let backup = self.config.backup_path();

        if live.exists() {
            std::fs::copy(&live, &backup)?;
        }
        std::fs::copy(staging, &live)?;
        std::fs::remove_file(staging)?;

        schedule_backup_cleanup(backup);

        self.start_initial()
    }

    /// Best-effort re-spawn from the current live binary
    fn recover(&mut self) {
        self.logger.warn("Restarting with the previous binary");
        if let Err(err) = self.start_initial() {
            self.logger.error(&format!("Recovery failed: {err}"));
        }
    }

    fn log_dir_contents(&self, dir: Option<&Path>) {
        let Some(dir) = dir else { return };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        self.logger.warn(&format!(
            "Contents of {}: {}",
            dir.display(),
            names.join(", ")
        ));
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the exit observer for a fresh child. The observer polls
/// `try_wait`, records the status, clears the running flag, and reports the
/// exit on the channel.
fn observe(child: Child, pid: u32, logger: Logger) -> ChildHandle {
    let child = Arc::new(Mutex::new(child));
    let running = Arc::new(AtomicBool::new(true));
    let (exit_tx, exit_rx) = channel();

    let observed = child.clone();
    let flag = running.clone();
    thread::spawn(move || loop {
        let status = observed.lock().unwrap().try_wait();
        match status {
            Ok(Some(status)) => {
                flag.store(false, Ordering::SeqCst);
                log_exit(&logger, pid, status);
                let _ = exit_tx.send(status);
                break;
            }
            Ok(None) => thread::sleep(Duration::from_millis(EXIT_POLL_MS)),
            Err(_) => {
                flag.store(false, Ordering::SeqCst);
                break;
            }
        }
    });

    ChildHandle {
        pid,
        child,
        running,
        exit_rx,
    }
}

/// Exit codes that are part of normal supervision: clean exit, SIGTERM
/// (graceful stop), SIGKILL (escalation)
fn log_exit(logger: &Logger, pid: u32, status: ExitStatus) {
    match exit_code(status) {
        Some(code @ (0 | -15 | -9)) => {
            logger.detail(&format!("Process {pid} exited with code {code}"));
        }
        Some(code) => {
            logger.warn(&format!("Process {pid} exited with code {code}"));
        }
        None => {
            logger.warn(&format!("Process {pid} exited with unknown status"));
        }
    }
}

/// Exit code, with termination-by-signal mapped to the negated signal
/// number (`-15` for SIGTERM, `-9` for SIGKILL)
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|s| -s))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

/// Platform's default termination signal: SIGTERM on POSIX. Windows has no
/// graceful equivalent accessible through the standard library, so the
/// escalation signal is used directly there.
#[cfg(unix)]
fn send_term(handle: &ChildHandle) -> ZenoResult<()> {
    let rc = unsafe { libc::kill(handle.pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    // Exited between the running check and the signal
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(ZenoError::Io(err))
    }
}

#[cfg(not(unix))]
fn send_term(handle: &ChildHandle) -> ZenoResult<()> {
    force_kill(handle);
    Ok(())
}

fn force_kill(handle: &ChildHandle) {
    // Ignore failures: the process may have exited already
    let _ = handle.child.lock().unwrap().kill();
}

/// Fire-and-forget deletion of the backup binary. Failure is tolerated;
/// the next swap overwrites the file anyway.
fn schedule_backup_cleanup(backup: std::path::PathBuf) {
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(BACKUP_TTL_SECS));
        let _ = std::fs::remove_file(&backup);
    });
}
