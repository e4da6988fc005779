//! File logging for hosts embedding the repository core.
//!
//! # Responsibility
//! - Start rolling file logs once per process from a `LogSettings` value.
//! - Record the repository and store settings a process runs with.
//!
//! # Invariants
//! - Repository and unit-of-work events carry entity names, ids, row counts
//!   and durations only.
//! - Statement text is emitted at `trace` by the store module alone; the
//!   `trace_statements` switch raises just that module to `trace`.
//! - The first successful `init_logging` fixes the settings for the process.

use crate::config::RepositoryConfig;
use crate::db::store::LOG_TARGET as STORE_LOG_TARGET;
use crate::db::StoreOptions;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const LOG_BASENAME: &str = "repokit";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 3;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(LoggingError::UnknownLevel(value.to_string())),
        }
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub level: LogLevel,
    /// Absolute directory for the rotated `repokit*.log` files.
    pub dir: PathBuf,
    /// Log statement text at `trace` whatever `level` is.
    #[serde(default)]
    pub trace_statements: bool,
}

impl LogSettings {
    pub fn new(level: LogLevel, dir: impl Into<PathBuf>) -> Self {
        Self {
            level,
            dir: dir.into(),
            trace_statements: false,
        }
    }

    pub fn with_statement_trace(mut self) -> Self {
        self.trace_statements = true;
        self
    }

    /// Filter string handed to the logger backend.
    fn filter_spec(&self) -> String {
        if self.trace_statements && self.level < LogLevel::Trace {
            format!("{}, {STORE_LOG_TARGET}=trace", self.level)
        } else {
            self.level.to_string()
        }
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    RelativeDir(PathBuf),
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// Logging already runs with different settings.
    AlreadyActive {
        active: Box<LogSettings>,
    },
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLevel(value) => write!(
                f,
                "unknown log level `{value}`; expected error|warn|info|debug|trace"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::AlreadyActive { active } => write!(
                f,
                "logging already active at `{}` in `{}`",
                active.level,
                active.dir.display()
            ),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(err: FlexiLoggerError) -> Self {
        Self::Backend(err)
    }
}

/// Starts file logging, or confirms that logging already runs with `settings`.
///
/// # Errors
/// - `RelativeDir` when `settings.dir` is not absolute.
/// - `AlreadyActive` when an earlier call started logging with other settings.
/// - `CreateDir` / `Backend` when the log files cannot be opened.
pub fn init_logging(settings: &LogSettings) -> Result<(), LoggingError> {
    if !settings.dir.is_absolute() {
        return Err(LoggingError::RelativeDir(settings.dir.clone()));
    }
    let active = ACTIVE.get_or_try_init(|| start(settings))?;
    if active.settings != *settings {
        return Err(LoggingError::AlreadyActive {
            active: Box::new(active.settings.clone()),
        });
    }
    Ok(())
}

fn start(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.filter_spec())?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.clone())
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    info!(
        "event=logging_init module=logging status=ok level={} trace_statements={} dir={} version={}",
        settings.level,
        settings.trace_statements,
        settings.dir.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

pub fn active_settings() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> LogLevel {
    if cfg!(debug_assertions) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Logs the repository and connection settings in effect.
pub fn log_runtime_settings(config: &RepositoryConfig, options: &StoreOptions) {
    info!("{}", runtime_settings_event(config, options));
}

fn runtime_settings_event(config: &RepositoryConfig, options: &StoreOptions) -> String {
    format!(
        "event=runtime_settings module=logging status=ok on_missing_delete={} \
         clear_after_bulk_update={} max_page_size={} busy_timeout_ms={} foreign_keys={}",
        config.on_missing_delete.as_str(),
        config.clear_after_bulk_update,
        config.max_page_size,
        options.busy_timeout.as_millis(),
        options.foreign_keys
    )
}
