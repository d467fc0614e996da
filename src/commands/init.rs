//! Init command - scaffold a default zeno.yml

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;

use zeno::config::CONFIG_FILE;

/// Default config template. Every key is optional; the values below are
/// the built-in defaults.
const CONFIG_TEMPLATE: &str = r#"# Zeno configuration
# All keys are optional; the values shown are the defaults.

# Project root to watch, relative to where zeno runs
root: "."

# Working directory for build artifacts, under root
tmp_dir: "tmp"

build:
  # Build command; rewritten on rebuilds so the artifact lands next to the
  # live binary with a _new suffix
  cmd: "dart compile exe lib/main.dart -o ./tmp/main_new.exe"
  # The binary zeno supervises
  bin: "./tmp/main.exe"
  # Build error log, created under tmp_dir
  log: "build-errors.log"
  # Extensions that trigger a reload (without the leading dot)
  include_ext:
    - "dart"
  exclude_dir: []
  include_dir: []
  exclude_file: []
  include_file: []
  exclude_regex: []
  # Commands run before / after each build
  pre_cmd: []
  post_cmd: []
  # Arguments passed to the supervised binary
  args: []
  # Debounce window in milliseconds
  delay: 1500
  # Grace period before SIGTERM escalates to SIGKILL
  kill_delay: 1500
  stop_on_error: false
  exclude_unchanged: true
  follow_symlink: false
  # Polling backend instead of native FS notifications
  poll: false
  poll_interval: 500

log:
  add_time: false
  main_only: false
  silent: false

# Reserved for the dev proxy; not used yet
proxy:
  enabled: false
  proxy_port: 8090
  app_port: 8080

screen:
  clear_on_rebuild: false
  keep_scroll: true

misc:
  clean_on_exit: false
"#;

/// Write a default config into the working directory, prompting before
/// overwriting an existing one.
pub fn cmd_init(force: bool) -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() && !force {
        if !std::io::stdin().is_terminal() {
            bail!("{CONFIG_FILE} already exists. Use --force to overwrite.");
        }
        let overwrite = dialoguer::Confirm::new()
            .with_prompt(format!("{CONFIG_FILE} already exists. Overwrite?"))
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Aborted.");
            return Ok(());
        }
    }

    fs::write(path, CONFIG_TEMPLATE).with_context(|| format!("Failed to write {CONFIG_FILE}"))?;

    println!("Created {CONFIG_FILE}");
    println!("Next: adjust build.cmd and build.bin, then run `zeno run`");
    Ok(())
}
