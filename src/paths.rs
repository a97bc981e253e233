//! On-disk layout of the tool's data directory.
//!
//! Everything lives under `~/.minly` unless `MINLY_HOME` points elsewhere:
//!
//! ```text
//! <root>/configs/<project>.toml
//! <root>/logs/minly_<timestamp>.log.json
//! <root>/storages/<project>/YYYY-MM.jsonl
//! <root>/updates/<uuid>/
//! <root>/lastrun/last_run.json
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::env::Env;

/// Errors resolving or creating the data directory.
#[derive(Debug, thiserror::Error)]
pub enum PathsError {
    #[error("could not determine home directory; set {}", constants::ENV_HOME)]
    NoHome,

    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolved data-directory root.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve the root from `MINLY_HOME`, falling back to `~/.minly`.
    pub fn discover(env: &Env) -> Result<Self, PathsError> {
        if let Some(home) = env.non_empty(constants::ENV_HOME) {
            return Ok(Self::at(home));
        }
        let home = dirs::home_dir().ok_or(PathsError::NoHome)?;
        Ok(Self::at(home.join(constants::DATA_DIR)))
    }

    /// Use an explicit root (tests, `MINLY_HOME`).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join(constants::CONFIGS_DIR)
    }

    pub fn config_file(&self, project: &str) -> PathBuf {
        self.configs_dir().join(format!("{project}.toml"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(constants::LOGS_DIR)
    }

    pub fn storage_dir(&self, project: &str) -> PathBuf {
        self.root.join(constants::STORAGES_DIR).join(project)
    }

    pub fn updates_dir(&self) -> PathBuf {
        self.root.join(constants::UPDATES_DIR)
    }

    pub fn lastrun_dir(&self) -> PathBuf {
        self.root.join(constants::LASTRUN_DIR)
    }
}

/// Create `path` and its parents, restricting new directories to the owner
/// on Unix.
pub fn ensure_private_dir(path: &Path) -> Result<(), PathsError> {
    create_private_dir(path).map_err(|source| PathsError::Create {
        path: path.to_path_buf(),
        source,
    })
}

/// Same as [`ensure_private_dir`] but returns the bare I/O error, for
/// callers that wrap it in their own error type.
pub fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minly_home_overrides_root() {
        let env = Env::mock([(constants::ENV_HOME, "/tmp/minly-test-root")]);
        let paths = Paths::discover(&env).unwrap();
        assert_eq!(paths.root(), Path::new("/tmp/minly-test-root"));
    }

    #[test]
    fn layout_is_rooted() {
        let paths = Paths::at("/data");
        assert_eq!(paths.config_file("demo"), PathBuf::from("/data/configs/demo.toml"));
        assert_eq!(paths.storage_dir("demo"), PathBuf::from("/data/storages/demo"));
        assert_eq!(paths.logs_dir(), PathBuf::from("/data/logs"));
        assert_eq!(paths.updates_dir(), PathBuf::from("/data/updates"));
        assert_eq!(paths.lastrun_dir(), PathBuf::from("/data/lastrun"));
    }

    #[test]
    fn ensure_private_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_private_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Idempotent
        ensure_private_dir(&nested).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
