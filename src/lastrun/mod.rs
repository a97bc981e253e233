//! Outcome of the previous invocation.
//!
//! Written at the end of every run to `lastrun/last_run.json` and read at
//! startup so a failed run is reported the next time the tool starts.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::{self, Paths};

const FILE_NAME: &str = "last_run.json";

#[derive(Debug, Error)]
pub enum LastRunError {
    #[error("failed to {action} {path}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode last run")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRun {
    pub timestamp: DateTime<Utc>,
    /// Empty when the run succeeded.
    #[serde(default)]
    pub error: String,
}

impl LastRun {
    pub fn failed(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Record the outcome of this run.
pub fn write(paths: &Paths, error: Option<&str>) -> Result<(), LastRunError> {
    let dir = paths.lastrun_dir();
    paths::create_private_dir(&dir).map_err(|source| LastRunError::Io {
        action: "create",
        path: dir.clone(),
        source,
    })?;

    let record = LastRun {
        timestamp: Utc::now(),
        error: error.unwrap_or_default().to_string(),
    };
    let json = serde_json::to_string_pretty(&record).map_err(LastRunError::Encode)?;

    let path = dir.join(FILE_NAME);
    fs::write(&path, json).map_err(|source| LastRunError::Io {
        action: "write",
        path,
        source,
    })
}

/// The previous outcome, if one was recorded and is readable.
pub fn read(paths: &Paths) -> Option<LastRun> {
    let path = paths.lastrun_dir().join(FILE_NAME);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable last run");
            None
        }
    }
}
