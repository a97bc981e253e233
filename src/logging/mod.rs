//! Structured logging.
//!
//! Each run writes JSON lines to its own file under `logs/`, through a
//! non-blocking writer whose [`LogGuard`] flushes on drop. Warnings and
//! errors are also printed to stderr unless `MINLY_LOG_NO_CONSOLE` is set.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, util::TryInitError};

use crate::constants::{ENV_LOG_LEVEL, ENV_LOG_NO_CONSOLE};
use crate::env::Env;
use crate::paths::{self, Paths, PathsError};

const LOG_SUFFIX: &str = ".log.json";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    Dir(#[from] PathsError),

    #[error("failed to create log file {path}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install log subscriber")]
    Install(#[source] TryInitError),
}

/// Keeps the background log writer alive. Dropping it flushes pending
/// lines to disk.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _worker: WorkerGuard,
    file: PathBuf,
}

impl LogGuard {
    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Install the global subscriber for this run.
pub fn init(paths: &Paths, env: &Env) -> Result<LogGuard, LoggingError> {
    let dir = paths.logs_dir();
    paths::ensure_private_dir(&dir)?;

    let path = dir.join(log_file_name(Utc::now()));
    let file = File::create(&path).map_err(|source| LoggingError::OpenFile {
        path: path.clone(),
        source,
    })?;
    let (writer, worker) = tracing_appender::non_blocking(file);

    let (level, invalid) = resolve_level(env);
    let file_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(format!("minly={level}"));

    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(file_filter);

    let console_layer = (!env.flag(ENV_LOG_NO_CONSOLE)).then(|| {
        fmt::layer()
            .compact()
            .without_time()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(console_level(level))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(LoggingError::Install)?;

    if let Some(value) = invalid {
        tracing::warn!(%value, "ignoring invalid {ENV_LOG_LEVEL}; using info");
    }
    tracing::debug!(file = %path.display(), %level, "logging initialised");

    Ok(LogGuard {
        _worker: worker,
        file: path,
    })
}

/// Level from `MINLY_LOG_LEVEL`, defaulting to `info`. An unparsable value
/// is returned alongside so it can be reported once logging is up.
fn resolve_level(env: &Env) -> (LevelFilter, Option<String>) {
    match env.non_empty(ENV_LOG_LEVEL) {
        None => (LevelFilter::INFO, None),
        Some(raw) => match raw.trim().parse::<LevelFilter>() {
            Ok(level) => (level, None),
            Err(_) => (LevelFilter::INFO, Some(raw)),
        },
    }
}

/// The console only shows warnings unless a debug level was requested.
fn console_level(level: LevelFilter) -> LevelFilter {
    if level >= LevelFilter::DEBUG {
        level
    } else {
        level.min(LevelFilter::WARN)
    }
}

fn log_file_name(now: chrono::DateTime<Utc>) -> String {
    format!("minly_{}{LOG_SUFFIX}", now.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// Remove log files in `dir` last modified more than `max_age` before
/// `now`. Returns how many were removed. A missing directory removes
/// nothing.
pub fn cleanup_old_logs(dir: &Path, max_age: Duration, now: SystemTime) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(LOG_SUFFIX) || !entry.file_type()?.is_file() {
            continue;
        }
        if entry.metadata()?.modified()? < cutoff {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
