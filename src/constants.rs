//! App-wide constants.
//!
//! Centralises the tool name, data-directory layout, environment variable
//! names, and URLs so a rename only requires changing this file.

/// Display name of the tool (lowercase). Also the executable name inside
/// release archives.
pub const APP_NAME: &str = "minly";

/// Version of this build. Release pipelines inject `MINLY_RELEASE_VERSION`;
/// local builds report `dev` and refuse to self-update.
pub const VERSION: &str = match option_env!("MINLY_RELEASE_VERSION") {
    Some(v) => v,
    None => "dev",
};

/// Commit the binary was built from.
pub const GIT_SHA: &str = match option_env!("MINLY_GIT_SHA") {
    Some(v) => v,
    None => "unknown",
};

/// Build date injected by the release pipeline.
pub const BUILD_DATE: &str = match option_env!("MINLY_BUILD_DATE") {
    Some(v) => v,
    None => "unknown",
};

/// Compilation target triple (set by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// User agent for every outgoing HTTP request.
pub const USER_AGENT: &str = concat!("minly/", env!("CARGO_PKG_VERSION"));

/// GitHub API endpoint describing the latest published release.
pub const GITHUB_RELEASES_LATEST_API: &str =
    "https://api.github.com/repos/devusSs/minly/releases/latest";

/// Directory name under the home directory holding all tool data.
pub const DATA_DIR: &str = ".minly";

// ── Data directory layout ───────────────────────────────────────────

pub const CONFIGS_DIR: &str = "configs";
pub const LOGS_DIR: &str = "logs";
pub const STORAGES_DIR: &str = "storages";
pub const UPDATES_DIR: &str = "updates";
pub const LASTRUN_DIR: &str = "lastrun";

/// Age after which log files are removed by background cleanup.
pub const LOG_RETENTION: std::time::Duration = std::time::Duration::from_secs(30 * 24 * 60 * 60);

// ── Environment variable names ──────────────────────────────────────

pub const ENV_HOME: &str = "MINLY_HOME";
pub const ENV_PROJECT: &str = "MINLY_PROJECT";
pub const ENV_LOG_LEVEL: &str = "MINLY_LOG_LEVEL";
pub const ENV_LOG_NO_CONSOLE: &str = "MINLY_LOG_NO_CONSOLE";
pub const ENV_STORAGE_ENDPOINT: &str = "MINLY_STORAGE_ENDPOINT";
pub const ENV_STORAGE_USE_SSL: &str = "MINLY_STORAGE_USE_SSL";
pub const ENV_STORAGE_BUCKET: &str = "MINLY_STORAGE_BUCKET";
pub const ENV_STORAGE_REGION: &str = "MINLY_STORAGE_REGION";
pub const ENV_LINK_EXPIRY_HOURS: &str = "MINLY_LINK_EXPIRY_HOURS";
pub const ENV_SHORTENER_ENDPOINT: &str = "MINLY_SHORTENER_ENDPOINT";
