//! Configuration module for Zeno
//!
//! `zeno.yml` (or `.zeno.yml`) is a YAML document of optional sections.
//! Every key has a default and unknown keys are ignored, so an empty file is
//! a valid config. Discovery order in the working directory:
//! 1. `--config <path>` (highest priority)
//! 2. `zeno.yml`
//! 3. `.zeno.yml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ZenoError, ZenoResult};

/// Default config file name
pub const CONFIG_FILE: &str = "zeno.yml";

/// Hidden variant, checked after [`CONFIG_FILE`]
pub const HIDDEN_CONFIG_FILE: &str = ".zeno.yml";

/// Suffix inserted before the extension to form the staging binary path
const STAGING_SUFFIX: &str = "_new";

/// Build section: what to run, what it produces, and when to re-run it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build command, whitespace-tokenised (arguments with spaces are not
    /// supported)
    #[serde(default = "default_build_cmd")]
    pub cmd: String,

    /// Path of the binary the build produces, relative to `root` unless
    /// absolute
    #[serde(default = "default_build_bin")]
    pub bin: String,

    /// Build error log file name, created under the tmp directory
    #[serde(default = "default_build_log")]
    pub log: String,

    /// Watched extensions (without the leading dot); empty means all
    #[serde(default = "default_include_ext")]
    pub include_ext: Vec<String>,

    /// Directories pruned from the watch walk
    #[serde(default)]
    pub exclude_dir: Vec<String>,

    /// If non-empty, only these directories are walked
    #[serde(default)]
    pub include_dir: Vec<String>,

    /// File basenames that never trigger a reload
    #[serde(default)]
    pub exclude_file: Vec<String>,

    /// If non-empty, only these file basenames trigger a reload
    #[serde(default)]
    pub include_file: Vec<String>,

    /// Regexes matched against the relative path; a match rejects the file
    #[serde(default)]
    pub exclude_regex: Vec<String>,

    /// Commands run before each build
    #[serde(default)]
    pub pre_cmd: Vec<String>,

    /// Commands run after each successful build
    #[serde(default)]
    pub post_cmd: Vec<String>,

    /// Arguments passed to the supervised binary
    #[serde(default)]
    pub args: Vec<String>,

    /// Debounce window in milliseconds
    #[serde(default = "default_delay")]
    pub delay: u64,

    /// Grace period before SIGTERM escalates to SIGKILL, in milliseconds
    #[serde(default = "default_kill_delay")]
    pub kill_delay: u64,

    /// Keep the current child when a rebuild fails
    #[serde(default)]
    pub stop_on_error: bool,

    /// Reserved; parsed but not consulted
    #[serde(default = "default_true")]
    pub exclude_unchanged: bool,

    /// Reserved; parsed but not consulted
    #[serde(default)]
    pub follow_symlink: bool,

    /// Use the polling backend instead of native FS notifications
    #[serde(default)]
    pub poll: bool,

    /// Polling period in milliseconds (only with `poll: true`)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            cmd: default_build_cmd(),
            bin: default_build_bin(),
            log: default_build_log(),
            include_ext: default_include_ext(),
            exclude_dir: Vec::new(),
            include_dir: Vec::new(),
            exclude_file: Vec::new(),
            include_file: Vec::new(),
            exclude_regex: Vec::new(),
            pre_cmd: Vec::new(),
            post_cmd: Vec::new(),
            args: Vec::new(),
            delay: default_delay(),
            kill_delay: default_kill_delay(),
            stop_on_error: false,
            exclude_unchanged: true,
            follow_symlink: false,
            poll: false,
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_build_cmd() -> String {
    "dart compile exe lib/main.dart -o ./tmp/main_new.exe".to_string()
}

fn default_build_bin() -> String {
    "./tmp/main.exe".to_string()
}

fn default_build_log() -> String {
    "build-errors.log".to_string()
}

fn default_include_ext() -> Vec<String> {
    vec!["dart".to_string()]
}

fn default_delay() -> u64 {
    1500
}

fn default_kill_delay() -> u64 {
    1500
}

fn default_poll_interval() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Log section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Prefix each line with HH:MM:SS
    #[serde(default)]
    pub add_time: bool,

    /// Suppress watcher and debounce detail lines
    #[serde(default)]
    pub main_only: bool,

    /// Suppress everything except warnings and errors
    #[serde(default)]
    pub silent: bool,
}

/// Proxy section. Reserved: parsed and round-tripped, never wired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    #[serde(default = "default_app_port")]
    pub app_port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy_port: default_proxy_port(),
            app_port: default_app_port(),
        }
    }
}

fn default_proxy_port() -> u16 {
    8090
}

fn default_app_port() -> u16 {
    8080
}

/// Screen section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Clear the terminal before each rebuild
    #[serde(default)]
    pub clear_on_rebuild: bool,

    /// Preserve scrollback when clearing (skip the cursor-home sequence)
    #[serde(default = "default_true")]
    pub keep_scroll: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            clear_on_rebuild: false,
            keep_scroll: true,
        }
    }
}

/// Misc section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MiscConfig {
    /// Delete the tmp directory on exit
    #[serde(default)]
    pub clean_on_exit: bool,
}

/// Main configuration structure
///
/// Immutable after startup; the engine and its collaborators share it
/// read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Project root, resolved against the process working directory
    #[serde(default = "default_root")]
    pub root: String,

    /// Name of the working directory for build artifacts, under `root`
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub screen: ScreenConfig,

    #[serde(default)]
    pub misc: MiscConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            tmp_dir: default_tmp_dir(),
            build: BuildConfig::default(),
            log: LogConfig::default(),
            proxy: ProxyConfig::default(),
            screen: ScreenConfig::default(),
            misc: MiscConfig::default(),
        }
    }
}

fn default_root() -> String {
    ".".to_string()
}

fn default_tmp_dir() -> String {
    "tmp".to_string()
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> ZenoResult<Self> {
        let content = fs::read_to_string(path)?;
        // An empty document deserialises to YAML null, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(&content).map_err(|e| ZenoError::InvalidConfig {
            file: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Find the config file in `dir` by the documented precedence
    pub fn discover(dir: &Path) -> ZenoResult<PathBuf> {
        for name in [CONFIG_FILE, HIDDEN_CONFIG_FILE] {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(ZenoError::ConfigNotFound {
            dir: dir.to_path_buf(),
        })
    }

    /// Serialise back to the documented YAML schema
    pub fn to_yaml(&self) -> ZenoResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Project root as a path
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Live binary path: `build.bin` joined to `root` unless absolute
    pub fn bin_path(&self) -> PathBuf {
        let bin = Path::new(&self.build.bin);
        if bin.is_absolute() {
            bin.to_path_buf()
        } else {
            self.root_path().join(bin)
        }
    }

    /// The engine-owned artifact directory
    pub fn tmp_path(&self) -> PathBuf {
        self.root_path().join(&self.tmp_dir)
    }

    /// Build error log location
    pub fn build_log_path(&self) -> PathBuf {
        self.tmp_path().join(&self.build.log)
    }

    /// Staging binary as a config-relative string, used for the build
    /// command rewrite (`./tmp/main.exe` → `./tmp/main_new.exe`)
    pub fn staging_bin(&self) -> String {
        add_suffix_before_ext(&self.build.bin, STAGING_SUFFIX)
    }

    /// Staging binary path, resolved the same way as [`Config::bin_path`]
    pub fn staging_path(&self) -> PathBuf {
        let staging = self.staging_bin();
        let staging = Path::new(&staging);
        if staging.is_absolute() {
            staging.to_path_buf()
        } else {
            self.root_path().join(staging)
        }
    }

    /// Backup path the swap writes before overwriting the live binary
    pub fn backup_path(&self) -> PathBuf {
        let live = self.bin_path();
        PathBuf::from(format!("{}.backup", live.display()))
    }
}

/// Insert `suffix` before the final extension, or append it when there is
/// none: `foo.exe` → `foo_new.exe`, `server` → `server_new`.
fn add_suffix_before_ext(bin: &str, suffix: &str) -> String {
    let path = Path::new(bin);
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => parent
            .join(format!(
                "{}{}.{}",
                stem.to_string_lossy(),
                suffix,
                ext.to_string_lossy()
            ))
            .to_string_lossy()
            .into_owned(),
        (Some(stem), None) => parent
            .join(format!("{}{}", stem.to_string_lossy(), suffix))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{bin}{suffix}"),
    }
}
