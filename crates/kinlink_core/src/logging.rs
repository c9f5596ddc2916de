//! Rolling file logs for the engine.
//!
//! # Responsibility
//! - Turn `log_level`/`log_dir` settings into one validated [`LogSettings`].
//! - Start the `flexi_logger` backend once per process and record what it
//!   was started with.
//!
//! # Invariants
//! - A relative `log_dir` lives under the vault root it was configured for.
//! - Starting twice with equal settings is a no-op; other settings are
//!   rejected with [`LoggingError::AlreadyActive`].
//! - Contact names and relationship values are logged at `debug` only.

use crate::config::EngineConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "kinlink";
const ROTATE_AT_BYTES: u64 = 4 * 1024 * 1024;
const KEPT_LOG_FILES: usize = 3;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    EmptyDirectory,
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    AlreadyActive {
        active: LogSettings,
        requested: LogSettings,
    },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::EmptyDirectory => write!(f, "log_dir cannot be empty"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "failed to create log directory `{}`: {source}", dir.display())
            }
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already writes {active}; refusing to switch to {requested}"
            ),
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Validated level and absolute directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: &'static str,
    pub dir: PathBuf,
}

impl LogSettings {
    /// `dir` is joined onto `base` unless it is already absolute.
    pub fn resolve(level: &str, dir: &str, base: &Path) -> Result<Self, LoggingError> {
        let level = parse_level(level)?;
        let dir = dir.trim();
        if dir.is_empty() {
            return Err(LoggingError::EmptyDirectory);
        }
        let dir = Path::new(dir);
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base.join(dir)
        };
        Ok(Self { level, dir })
    }

    /// Settings from `kinlink.toml`; `None` when no `log_dir` is configured.
    pub fn from_config(config: &EngineConfig, vault_root: &Path) -> Result<Option<Self>, LoggingError> {
        let Some(dir) = config.log_dir.as_deref() else {
            return Ok(None);
        };
        let level = config
            .log_level
            .as_deref()
            .unwrap_or_else(|| default_log_level());
        Self::resolve(level, dir, vault_root).map(Some)
    }
}

impl Display for LogSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` at level `{}`", self.dir.display(), self.level)
    }
}

/// Starts logging for a vault. Returns whether a logger is running.
pub fn init_logging_from_config(config: &EngineConfig, vault_root: &Path) -> Result<bool, LoggingError> {
    match LogSettings::from_config(config, vault_root)? {
        Some(settings) => init_logging(settings).map(|()| true),
        None => Ok(false),
    }
}

/// Starts rolling file logs with `settings`.
pub fn init_logging(settings: LogSettings) -> Result<(), LoggingError> {
    if let Some(active) = ACTIVE.get() {
        return ensure_same(&active.settings, settings);
    }

    let active = ACTIVE.get_or_try_init(|| start_backend(settings.clone()))?;
    ensure_same(&active.settings, settings)
}

/// Settings of the running logger, if any.
pub fn active_log_settings() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn ensure_same(active: &LogSettings, requested: LogSettings) -> Result<(), LoggingError> {
    if *active == requested {
        return Ok(());
    }
    Err(LoggingError::AlreadyActive {
        active: active.clone(),
        requested,
    })
}

fn start_backend(settings: LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDirectory {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEPT_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=engine_start module=logging status=ok version={} level={} os={}",
        env!("CARGO_PKG_VERSION"),
        settings.level,
        std::env::consts::OS
    );

    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(LoggingError::InvalidLevel(level.trim().to_string())),
    }
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            one_line(&payload, PANIC_SUMMARY_CHARS)
        );
        previous(info);
    }));
}

/// Payloads can quote note text: newlines flattened, length capped.
fn one_line(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut capped: String = flat.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}
