//! Build command runner
//!
//! Runs the user's build command in the project root with stderr captured.
//! Rebuilds rewrite the command so the artifact lands on the staging path
//! instead of the live binary. Failures append a timestamped line to the
//! build error log under the tmp directory.
//!
//! Known limitation: the command is whitespace-tokenised, so arguments that
//! themselves contain spaces are not supported.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::error::ZenoError;
use crate::logger::Logger;

/// Outcome of one build invocation
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub success: bool,
    pub stderr: String,
}

impl BuildResult {
    fn failure(stderr: String) -> Self {
        Self {
            success: false,
            stderr,
        }
    }
}

pub struct Builder {
    config: Config,
    logger: Logger,
}

impl Builder {
    pub fn new(config: Config, logger: Logger) -> Self {
        Self { config, logger }
    }

    /// Run `build.cmd` as configured, producing the live binary
    pub fn build_initial(&self) -> BuildResult {
        self.run_build(&self.config.build.cmd)
    }

    /// Run the build with every occurrence of `build.bin` rewritten to the
    /// staging path, so the live binary stays untouched until the swap
    pub fn rebuild(&self) -> BuildResult {
        let staged = self
            .config
            .build
            .cmd
            .replace(&self.config.build.bin, &self.config.staging_bin());
        self.run_build(&staged)
    }

    fn run_build(&self, cmd: &str) -> BuildResult {
        let mut parts = cmd.split_whitespace();
        let Some(program) = parts.next() else {
            let message = ZenoError::EmptyBuildCommand.to_string();
            self.append_build_log(&message);
            return BuildResult::failure(message);
        };

        let spawned = Command::new(program)
            .args(parts)
            .current_dir(&self.config.root)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(err) => {
                let message = format!("failed to spawn '{program}': {err}");
                self.append_build_log(&message);
                return BuildResult::failure(message);
            }
        };

        match child.wait_with_output() {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.status.success() {
                    BuildResult {
                        success: true,
                        stderr,
                    }
                } else {
                    self.append_build_log(&stderr);
                    BuildResult::failure(stderr)
                }
            }
            Err(err) => {
                let message = format!("build did not complete: {err}");
                self.append_build_log(&message);
                BuildResult::failure(message)
            }
        }
    }

    /// Append a timestamped entry to `<tmp>/<build.log>`. A failed write is
    /// only a warning.
    fn append_build_log(&self, text: &str) {
        let path = self.config.build_log_path();
        let line = format!("[{}] {}\n", chrono::Local::now().to_rfc3339(), text.trim_end());

        let written = path
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| {
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
            })
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(err) = written {
            self.logger
                .warn(&format!("Could not write {}: {err}", path.display()));
        }
    }
}
