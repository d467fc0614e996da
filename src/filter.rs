//! Watch-path filtering
//!
//! Pure predicates over paths, parameterised by the config's include/exclude
//! rules. The regexes are compiled once at construction; evaluation never
//! fails and performs no I/O.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::Config;
use crate::error::{ZenoError, ZenoResult};

/// Decides which files trigger a reload and which directories are watched
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    tmp_dir: String,
    include_ext: Vec<String>,
    exclude_dir: Vec<String>,
    include_dir: Vec<String>,
    exclude_file: Vec<String>,
    include_file: Vec<String>,
    exclude_regex: Vec<Regex>,
}

impl PathFilter {
    pub fn new(config: &Config) -> ZenoResult<Self> {
        let mut exclude_regex = Vec::with_capacity(config.build.exclude_regex.len());
        for pattern in &config.build.exclude_regex {
            let compiled = Regex::new(pattern).map_err(|e| ZenoError::InvalidExcludeRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            exclude_regex.push(compiled);
        }

        Ok(Self {
            root: config.root_path(),
            tmp_dir: config.tmp_dir.clone(),
            include_ext: config.build.include_ext.clone(),
            exclude_dir: config.build.exclude_dir.clone(),
            include_dir: config.build.include_dir.clone(),
            exclude_file: config.build.exclude_file.clone(),
            include_file: config.build.include_file.clone(),
            exclude_regex,
        })
    }

    /// Whether a change to `path` should trigger a reload.
    ///
    /// Rules are evaluated in order; the first negative decides:
    /// 1. extension not in `include_ext` (when non-empty)
    /// 2. basename in `exclude_file`
    /// 3. basename not in `include_file` (when non-empty)
    /// 4. relative path matches any `exclude_regex`
    pub fn should_watch(&self, path: &Path) -> bool {
        let Some(relative) = self.relative(path) else {
            return false;
        };

        if !self.include_ext.is_empty() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !self.include_ext.contains(&ext) {
                return false;
            }
        }

        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.exclude_file.contains(&basename) {
            return false;
        }

        if !self.include_file.is_empty() && !self.include_file.contains(&basename) {
            return false;
        }

        let relative_str = relative.to_string_lossy();
        if self
            .exclude_regex
            .iter()
            .any(|re| re.is_match(&relative_str))
        {
            return false;
        }

        true
    }

    /// Whether `dir` is pruned from the watch walk.
    ///
    /// The root itself is always watched. Below it:
    /// 1. the tmp directory is excluded
    /// 2. anything under an `exclude_dir` entry is excluded
    /// 3. with a non-empty `include_dir`, anything not under an entry is
    ///    excluded
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        let Some(relative) = self.relative(dir) else {
            return true;
        };

        if relative.as_os_str().is_empty() {
            return false;
        }

        if relative == Path::new(&self.tmp_dir) {
            return true;
        }

        if self
            .exclude_dir
            .iter()
            .any(|entry| relative.starts_with(entry))
        {
            return true;
        }

        if !self.include_dir.is_empty()
            && !self
                .include_dir
                .iter()
                .any(|entry| relative.starts_with(entry))
        {
            return true;
        }

        false
    }

    /// Path relative to the watch root; `None` for paths outside it
    fn relative(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(relative) = path.strip_prefix(&self.root) {
            return Some(relative.to_path_buf());
        }
        // Event backends report absolute, canonicalised paths even when the
        // configured root is relative or goes through a symlink
        let root = self.root.canonicalize().ok()?;
        path.strip_prefix(&root).ok().map(|p| p.to_path_buf())
    }
}
