//! Project config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`MINLY_STORAGE_*`, `MINLY_LINK_EXPIRY_HOURS`,
//!    `MINLY_SHORTENER_ENDPOINT`)
//! 2. `configs/<project>.toml`
//! 3. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ConfigError, validate};
use crate::constants;
use crate::env::{self, Env};
use crate::paths::{self, Paths};

/// One project's configuration. Secrets live in the keychain, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `host[:port]` without scheme.
    pub endpoint: String,
    pub use_ssl: bool,
    pub bucket: String,
    pub region: String,
    /// Lifetime of presigned links.
    pub link_expiry_hours: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            use_ssl: true,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            link_expiry_hours: 24,
        }
    }
}

impl StorageConfig {
    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(u64::from(self.link_expiry_hours) * 60 * 60)
    }

    /// Endpoint with the scheme implied by `use_ssl`.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }
}

/// YOURLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    /// Full URL of `yourls-api.php`.
    pub endpoint: String,
    /// Title attached to every short link.
    pub title: String,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            title: "Uploaded with minly".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Fresh config for `name` with defaults; the bucket is named after the
    /// project.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            storage: StorageConfig {
                bucket: name.clone(),
                ..StorageConfig::default()
            },
            shortener: ShortenerConfig::default(),
            created_at: now,
            updated_at: now,
            name,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::project_name(&self.name)?;
        if self.updated_at < self.created_at {
            return Err(ConfigError::Invalid {
                field: "updated_at",
                reason: "cannot be before created_at".to_string(),
            });
        }
        validate::storage_endpoint(&self.storage.endpoint)?;
        validate::bucket_name(&self.storage.bucket)?;
        validate::region(&self.storage.region)?;
        validate::link_expiry_hours(self.storage.link_expiry_hours)?;
        validate::shortener_endpoint(&self.shortener.endpoint)?;
        Ok(())
    }

    /// Load a saved project, apply environment overrides and validate.
    pub fn load(paths: &Paths, name: &str, env: &Env) -> Result<Self, ConfigError> {
        let path = paths.config_file(name);
        if !path.exists() {
            return Err(ConfigError::NotFound(name.to_string()));
        }
        let mut config = Self::load_file(&path)?;
        config.apply_env_vars(env);
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config from an arbitrary file (import).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.non_empty(constants::ENV_STORAGE_ENDPOINT) {
            self.storage.endpoint = val;
        }
        if let Some(val) = env.non_empty(constants::ENV_STORAGE_USE_SSL) {
            match env::parse_bool(&val) {
                Some(b) => self.storage.use_ssl = b,
                None => warn!(
                    "ignoring invalid {} value: {val}",
                    constants::ENV_STORAGE_USE_SSL
                ),
            }
        }
        if let Some(val) = env.non_empty(constants::ENV_STORAGE_BUCKET) {
            self.storage.bucket = val;
        }
        if let Some(val) = env.non_empty(constants::ENV_STORAGE_REGION) {
            self.storage.region = val;
        }
        if let Some(val) = env.non_empty(constants::ENV_LINK_EXPIRY_HOURS) {
            match val.trim().parse::<u32>() {
                Ok(hours) => self.storage.link_expiry_hours = hours,
                Err(_) => warn!(
                    "ignoring invalid {} value: {val}",
                    constants::ENV_LINK_EXPIRY_HOURS
                ),
            }
        }
        if let Some(val) = env.non_empty(constants::ENV_SHORTENER_ENDPOINT) {
            self.shortener.endpoint = val;
        }
    }

    /// Validate and write to `configs/<name>.toml`, replacing any previous
    /// version atomically.
    pub fn save(&self, paths: &Paths) -> Result<PathBuf, ConfigError> {
        self.validate()?;
        paths::ensure_private_dir(&paths.configs_dir())?;

        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        let path = paths.config_file(&self.name);
        let tmp_path = path.with_extension("toml.tmp");

        write_private(&tmp_path, content.as_bytes()).map_err(|source| ConfigError::WriteFile {
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(ConfigError::WriteFile { path, source });
        }
        Ok(path)
    }

    /// Mark the config as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid(name: &str) -> ProjectConfig {
        let mut config = ProjectConfig::new(name);
        config.storage.endpoint = "minio.example.com".to_string();
        config.shortener.endpoint = "https://sho.rt/yourls-api.php".to_string();
        config
    }

    fn no_env() -> Env {
        Env::mock(Vec::<(&str, &str)>::new())
    }

    #[test]
    fn new_uses_project_as_bucket() {
        let config = ProjectConfig::new("holiday");
        assert_eq!(config.storage.bucket, "holiday");
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.storage.link_expiry_hours, 24);
        assert!(config.storage.use_ssl);
    }

    #[test]
    fn validate_accepts_complete_config() {
        valid("holiday").validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_endpoints() {
        let err = ProjectConfig::new("holiday").validate().unwrap_err();
        assert!(err.to_string().contains("storage.endpoint"), "{err}");
    }

    #[test]
    fn validate_rejects_time_travel() {
        let mut config = valid("holiday");
        config.updated_at = config.created_at - chrono::Duration::seconds(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path());
        let config = valid("holiday");

        let path = config.save(&paths).unwrap();
        assert_eq!(path, paths.config_file("holiday"));
        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = ProjectConfig::load(&paths, "holiday", &no_env()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn save_refuses_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path());
        assert!(ProjectConfig::new("holiday").save(&paths).is_err());
        assert!(!paths.config_file("holiday").exists());
    }

    #[test]
    fn load_missing_project() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(&Paths::at(dir.path()), "absent", &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(name) if name == "absent"));
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path());
        valid("holiday").save(&paths).unwrap();

        let env = Env::mock([
            (constants::ENV_STORAGE_ENDPOINT, "localhost:9000"),
            (constants::ENV_STORAGE_USE_SSL, "false"),
            (constants::ENV_STORAGE_BUCKET, "scratchpad"),
            (constants::ENV_STORAGE_REGION, "eu-west-1"),
            (constants::ENV_LINK_EXPIRY_HOURS, "48"),
            (constants::ENV_SHORTENER_ENDPOINT, "http://localhost:8080/yourls-api.php"),
        ]);
        let config = ProjectConfig::load(&paths, "holiday", &env).unwrap();

        assert_eq!(config.storage.endpoint, "localhost:9000");
        assert!(!config.storage.use_ssl);
        assert_eq!(config.storage.bucket, "scratchpad");
        assert_eq!(config.storage.region, "eu-west-1");
        assert_eq!(config.storage.link_expiry_hours, 48);
        assert_eq!(config.shortener.endpoint, "http://localhost:8080/yourls-api.php");
        assert_eq!(config.storage.endpoint_url(), "http://localhost:9000");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path());
        valid("holiday").save(&paths).unwrap();

        let env = Env::mock([
            (constants::ENV_STORAGE_USE_SSL, "sometimes"),
            (constants::ENV_LINK_EXPIRY_HOURS, "a week"),
        ]);
        let config = ProjectConfig::load(&paths, "holiday", &env).unwrap();
        assert!(config.storage.use_ssl);
        assert_eq!(config.storage.link_expiry_hours, 24);
    }

    #[test]
    fn env_override_is_still_validated() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path());
        valid("holiday").save(&paths).unwrap();

        let env = Env::mock([(constants::ENV_LINK_EXPIRY_HOURS, "1000")]);
        let err = ProjectConfig::load(&paths, "holiday", &env).unwrap_err();
        assert!(err.to_string().contains("link_expiry_hours"), "{err}");
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "name = [").unwrap();
        let err = ProjectConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFile { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            r#"
name = "partial"
created_at = "2024-01-01T00:00:00Z"
updated_at = "2024-01-01T00:00:00Z"

[storage]
endpoint = "minio.local"
bucket = "partial"

[shortener]
endpoint = "https://sho.rt/yourls-api.php"
"#,
        )
        .unwrap();

        let config = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.storage.link_expiry_hours, 24);
        assert_eq!(config.shortener.title, "Uploaded with minly");
    }

    #[test]
    fn link_expiry_as_duration() {
        let config = valid("holiday");
        assert_eq!(config.storage.link_expiry(), Duration::from_secs(24 * 3600));
    }
}
