//! Logging Module
//!
//! tracing based logging shared by the exporter binaries:
//! - human readable events on stderr
//! - optionally a plain-text copy in a log file (no ANSI colours)
//! - `RUST_LOG` overrides the configured level
//!
//! # Examples
//!
//! ```no_run
//! use export_utils::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! init_logging("img_heic", LogConfig::default()).expect("Failed to initialize logging");
//! info!("Program started");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &["export_utils", "img_heic"];

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Copy every event into this file as well (appended)
    pub log_file: Option<PathBuf>,
    /// Default Warn; Info/Debug for verbose runs
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            level: Level::WARN,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// `export_utils=<level>,img_heic=<level>`
    pub fn filter_directives(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber. Fails if one is already installed or the
/// log file cannot be opened.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false);

    let file_layer = match &config.log_file {
        Some(path) => {
            let appender = open_log_file(path)?;
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(
        program = program_name,
        log_file = ?config.log_file,
        level = ?config.level,
        "Logging system initialized"
    );

    Ok(())
}

/// Non-rotating appender writing exactly `path`.
fn open_log_file(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {:?}", path))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {:?}", dir))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("Failed to open log file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.log_file.is_none());
        assert_eq!(config.level, Level::WARN);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .with_log_file("/tmp/img_heic_test.log")
            .with_level(Level::DEBUG);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/img_heic_test.log")));
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_filter_directives_cover_all_targets() {
        let config = LogConfig::new().with_level(Level::INFO);
        assert_eq!(config.filter_directives(), "export_utils=INFO,img_heic=INFO");
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
