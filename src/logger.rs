//! Engine logging
//!
//! A small value type the engine threads through its collaborators; no
//! global state. Output honours the `log` config section:
//! - `add_time` prefixes each line with HH:MM:SS
//! - `silent` suppresses info and detail lines
//! - `main_only` additionally suppresses detail lines (watcher noise,
//!   per-event reporting); `--verbose` overrides both

use crate::config::LogConfig;

/// Line prefix for all engine output
const PREFIX: &str = "[zeno]";

#[derive(Debug, Clone)]
pub struct Logger {
    add_time: bool,
    main_only: bool,
    silent: bool,
}

impl Logger {
    pub fn new(config: &LogConfig, verbose: bool) -> Self {
        Self {
            add_time: config.add_time,
            main_only: config.main_only && !verbose,
            silent: config.silent && !verbose,
        }
    }

    /// Main lifecycle lines: builds, reloads, shutdown
    pub fn info(&self, message: &str) {
        if self.silent {
            return;
        }
        println!("{}", self.format(message));
    }

    /// Watcher and per-event noise; dropped under `main_only`
    pub fn detail(&self, message: &str) {
        if self.silent || self.main_only {
            return;
        }
        println!("{}", self.format(message));
    }

    /// Always printed, to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{}", self.format(&format!("[WARN] {message}")));
    }

    /// Always printed, to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.format(&format!("[ERROR] {message}")));
    }

    fn format(&self, message: &str) -> String {
        if self.add_time {
            let now = chrono::Local::now().format("%H:%M:%S");
            format!("{PREFIX} {now} {message}")
        } else {
            format!("{PREFIX} {message}")
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(&LogConfig::default(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_plain() {
        let logger = Logger::new(&LogConfig::default(), false);
        assert_eq!(logger.format("hello"), "[zeno] hello");
    }

    #[test]
    fn test_format_with_time() {
        let config = LogConfig {
            add_time: true,
            ..LogConfig::default()
        };
        let logger = Logger::new(&config, false);
        let line = logger.format("hello");
        // "[zeno] HH:MM:SS hello"
        assert!(line.starts_with("[zeno] "));
        assert!(line.ends_with(" hello"));
        assert_eq!(line.len(), "[zeno] 00:00:00 hello".len());
    }

    #[test]
    fn test_verbose_overrides_silencing() {
        let config = LogConfig {
            silent: true,
            main_only: true,
            add_time: false,
        };
        let logger = Logger::new(&config, true);
        assert!(!logger.silent);
        assert!(!logger.main_only);
    }
}
