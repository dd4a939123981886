//! Logging setup for the detection tools
//!
//! Console output goes to stderr so that reports written to stdout stay
//! machine readable. Optionally mirrors everything into rotating log files.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// File name prefix shared by every rotated log file
pub const LOG_FILE_PREFIX: &str = "performance_issues";

const DEFAULT_LEVEL_FILTER: &str = "info,performance_issues=info";

/// Logging configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory to store log files
    pub log_dir: String,
    /// Log level filter (e.g., "info", "performance_issues=debug")
    pub level_filter: String,
    pub rotation: LogRotation,
    /// Whether to include timestamps in console output
    pub console_timestamps: bool,
    /// Whether to use JSON format for file logs
    pub file_json_format: bool,
}

/// Log file rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// A single file that is never rotated
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            other => Err(format!("unknown log rotation '{}', expected daily, hourly or never", other)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            level_filter: DEFAULT_LEVEL_FILTER.to_string(),
            rotation: LogRotation::Daily,
            console_timestamps: true,
            file_json_format: true,
        }
    }
}

fn env_filter(level_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_filter))
}

/// Initialize console (stderr) plus rotating file logging.
///
/// The returned guard flushes the background file writer on drop and must be
/// held until the program exits.
pub fn init_dual_logging(config: &LoggingConfig) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(&config.log_dir)?;

    let file_name = format!("{}.log", LOG_FILE_PREFIX);
    let file_appender = match config.rotation {
        LogRotation::Daily => rolling::daily(&config.log_dir, &file_name),
        LogRotation::Hourly => rolling::hourly(&config.log_dir, &file_name),
        LogRotation::Never => rolling::never(&config.log_dir, &file_name),
    };
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(true)
        .with_timer(if config.console_timestamps {
            ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string())
        } else {
            ChronoUtc::new("".to_string())
        })
        .with_filter(env_filter(&config.level_filter));

    let file_layer = if config.file_json_format {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
            .with_filter(env_filter(&config.level_filter))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()))
            .with_filter(env_filter(&config.level_filter))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        log_dir = %config.log_dir,
        rotation = ?config.rotation,
        json_format = config.file_json_format,
        "📁 Logging to console and rotating files"
    );

    Ok(guard)
}

/// Console-only logging for tools and tests
pub fn init_simple_logging(level_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level_filter))
        .try_init()?;

    tracing::debug!("🖥️ Console logging initialized");
    Ok(())
}

fn is_log_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.contains(".log"))
}

/// Log files written by this tool, sorted by name
pub fn list_log_files(log_dir: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_log_file(path))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Remove log files last modified more than `keep_days` ago
pub fn cleanup_old_logs(log_dir: &str, keep_days: u32) -> Result<usize, std::io::Error> {
    let max_age = Duration::from_secs(keep_days as u64 * 24 * 3600);
    let Some(cutoff_time) = SystemTime::now().checked_sub(max_age) else {
        return Ok(0);
    };

    let mut removed_count = 0;
    for path in list_log_files(log_dir) {
        let modified = path.metadata().and_then(|metadata| metadata.modified())?;
        if modified < cutoff_time {
            std::fs::remove_file(&path)?;
            removed_count += 1;
            tracing::debug!("🗑️ Removed old log file: {:?}", path);
        }
    }

    if removed_count > 0 {
        tracing::info!("🧹 Cleaned up {} old log files (older than {} days)", removed_count, keep_days);
    }
    Ok(removed_count)
}
