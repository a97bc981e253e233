//! Per-project configuration.
//!
//! Each project is a TOML file under `configs/`. Secrets are kept in the
//! keychain (see [`crate::secrets`]); everything else lives here.

pub mod loader;
pub mod validate;

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::paths::{Paths, PathsError};

pub use loader::{ProjectConfig, ShortenerConfig, StorageConfig};

/// Errors during config loading, validation and storage.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize config")]
    Serialize(#[source] toml::ser::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("project '{0}' does not exist; run `minly new` first")]
    NotFound(String),

    #[error("no project configured; run `minly new` first")]
    NoProjects,

    #[error(
        "multiple projects configured ({}); pass --project or set {}",
        .0.join(", "),
        constants::ENV_PROJECT
    )]
    Ambiguous(Vec<String>),

    #[error(transparent)]
    Dir(#[from] PathsError),
}

/// Names of all saved projects, sorted.
pub fn list_saved(paths: &Paths) -> Result<Vec<String>, ConfigError> {
    let dir = paths.configs_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::ReadFile { path: dir, source: e }),
    };

    let mut names = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigError::ReadFile {
                path: dir.clone(),
                source: e,
            })?
            .path();
        if path.is_file() && path.extension().is_some_and(|e| e == "toml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Remove a saved project file. Returns `false` if it did not exist.
pub fn delete(paths: &Paths, name: &str) -> Result<bool, ConfigError> {
    validate::project_name(name)?;
    let path = paths.config_file(name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::WriteFile { path, source: e }),
    }
}

/// Pick the project to operate on: the explicit flag, then
/// `MINLY_PROJECT`, then the only saved project. Names from the flag or the
/// environment must be valid project names.
pub fn resolve_project(
    paths: &Paths,
    explicit: Option<&str>,
    env: &Env,
) -> Result<String, ConfigError> {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        validate::project_name(name)?;
        return Ok(name.to_string());
    }
    if let Some(name) = env.non_empty(constants::ENV_PROJECT) {
        validate::project_name(&name)?;
        return Ok(name);
    }

    let mut saved = list_saved(paths)?;
    match saved.len() {
        0 => Err(ConfigError::NoProjects),
        1 => Ok(saved.remove(0)),
        _ => Err(ConfigError::Ambiguous(saved)),
    }
}
