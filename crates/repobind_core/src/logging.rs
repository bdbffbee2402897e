//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start the rolling `repobind` file logger once per process.
//! - Report the resolver context (registrations, entity model) once it is built.
//! - Record panics together with the thread that raised them.
//!
//! # Invariants
//! - Initialization is idempotent for an identical `LogConfig`.
//! - Re-initialization with another level or directory is rejected.
//! - Initialization never panics.

use crate::metadata::store::MetadataStore;
use crate::model::entity_model::EntityModel;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "repobind";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 4;
const PANIC_MESSAGE_CHARS: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Validated logger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub log_dir: PathBuf,
}

impl LogConfig {
    /// Parses a level name (`off` excluded) and an absolute directory.
    pub fn parse(level: &str, log_dir: &str) -> Result<Self, LoggingError> {
        let level = match level.trim().parse::<LevelFilter>() {
            Ok(LevelFilter::Off) | Err(_) => {
                return Err(LoggingError::InvalidLevel(level.trim().to_string()))
            }
            Ok(level) => level,
        };
        let log_dir = PathBuf::from(log_dir.trim());
        if !log_dir.is_absolute() {
            return Err(LoggingError::RelativeLogDir(log_dir));
        }
        Ok(Self { level, log_dir })
    }
}

/// Logging bootstrap errors.
#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    RelativeLogDir(PathBuf),
    CreateDir { log_dir: PathBuf, source: std::io::Error },
    Backend(flexi_logger::FlexiLoggerError),
    /// A logger with different settings is already running.
    Conflict { active: LogConfig, requested: LogConfig },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeLogDir(path) => {
                write!(f, "log directory must be absolute: `{}`", path.display())
            }
            Self::CreateDir { log_dir, source } => write!(
                f,
                "cannot create log directory `{}`: {source}",
                log_dir.display()
            ),
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logger already running at level {} in `{}`; cannot switch to level {} in `{}`",
                active.level,
                active.log_dir.display(),
                requested.level,
                requested.log_dir.display()
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

struct ActiveLogger {
    config: LogConfig,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// Warnings and errors are also duplicated to stderr.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let requested = LogConfig::parse(level, log_dir)?;
    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(requested.clone()))?;
    if active.config != requested {
        return Err(LoggingError::Conflict {
            active: active.config.clone(),
            requested,
        });
    }
    Ok(())
}

/// Settings of the running logger, if any.
pub fn logging_status() -> Option<LogConfig> {
    ACTIVE_LOGGER.get().map(|active| active.config.clone())
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Counts describing what a resolver can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySummary {
    pub repositories: usize,
    pub unbound: usize,
    pub entities: Vec<String>,
}

impl RegistrySummary {
    pub fn collect(store: &MetadataStore, model: &EntityModel) -> Self {
        let unbound = store
            .repository_ids()
            .iter()
            .filter_map(|id| store.lookup(id))
            .filter(|registration| registration.entity.is_none())
            .count();
        Self {
            repositories: store.len(),
            unbound,
            entities: model.entity_names(),
        }
    }
}

impl Display for RegistrySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "repositories={} unbound={} entities={}",
            self.repositories,
            self.unbound,
            self.entities.join(",")
        )
    }
}

/// Logs the registrations and entities a resolver will see.
pub fn log_resolver_context(store: &MetadataStore, model: &EntityModel) -> RegistrySummary {
    let summary = RegistrySummary::collect(store, model);
    info!("event=resolver_context module=logging status=ok {summary}");
    summary
}

fn start_logger(config: LogConfig) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&config.log_dir).map_err(|source| LoggingError::CreateDir {
        log_dir: config.log_dir.clone(),
        source,
    })?;

    let handle = Logger::with(config.level)
        .log_to_file(
            FileSpec::default()
                .directory(&config.log_dir)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=core_init module=logging status=ok core_version={} level={} log_dir={}",
        crate::core_version(),
        config.level,
        config.log_dir.display()
    );

    Ok(ActiveLogger {
        config,
        _handle: handle,
    })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<opaque payload>");
        error!(
            "event=panic module=logging status=error thread={} location={location} message={}",
            thread.name().unwrap_or("unnamed"),
            compact_message(payload)
        );
        previous(info);
    }));
}

// Whitespace runs, newlines included, collapse to one space.
fn compact_message(payload: &str) -> String {
    let compact = payload.split_whitespace().collect::<Vec<_>>().join(" ");
    match compact.char_indices().nth(PANIC_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}...", &compact[..cut]),
        None => compact,
    }
}
