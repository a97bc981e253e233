//! Self-update of the minly executable.
//!
//! Resolves the latest GitHub release, downloads the archive for the running
//! platform together with the checksums manifest, verifies the SHA-256
//! digest, extracts the executable and replaces the running binary. Every
//! step runs once; there are no retries.

pub mod archive;
pub mod checksum;
pub mod download;
pub mod release;
pub mod replace;

use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants;
use crate::paths::{self, Paths};
use crate::platform::{Platform, UnsupportedPlatform};

use release::{Release, ReleaseClient};

/// Pipeline stage an [`UpdateError`] occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ResolveLatest,
    CompareVersion,
    SelectAssets,
    DownloadAssets,
    VerifyChecksum,
    UnpackArchive,
    ApplyUpdate,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::ResolveLatest => "resolve latest release",
            Step::CompareVersion => "compare versions",
            Step::SelectAssets => "select release assets",
            Step::DownloadAssets => "download release assets",
            Step::VerifyChecksum => "verify checksum",
            Step::UnpackArchive => "unpack archive",
            Step::ApplyUpdate => "apply update",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during self-update.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("no release asset for {os}/{arch}")]
    NoMatchingAsset { os: String, arch: String },

    #[error("release has no checksums manifest")]
    ChecksumsAssetNotFound,

    #[error("checksums manifest has no entry for {os}/{arch}")]
    ChecksumNotFound { os: String, arch: String },

    #[error("checksum verification failed: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("invalid release archive: {0}")]
    ArchiveFormat(String),

    #[error("failed to {action} {path}")]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not determine current executable path")]
    CurrentExe(#[source] io::Error),

    #[error("invalid version '{version}'")]
    Version {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("refusing to update development build '{0}'")]
    DevelopmentBuild(String),

    #[error(transparent)]
    UnsupportedPlatform(#[from] UnsupportedPlatform),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("update cancelled")]
    Cancelled,

    #[error("{step} failed")]
    Step {
        step: Step,
        #[source]
        source: Box<UpdateError>,
    },
}

impl UpdateError {
    pub(crate) fn fs(action: &'static str, path: &Path, source: io::Error) -> Self {
        UpdateError::Filesystem {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Attribute this error to a pipeline step. Already attributed errors
    /// are returned unchanged.
    pub fn at(self, step: Step) -> Self {
        match self {
            UpdateError::Step { .. } => self,
            other => UpdateError::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The step this error was attributed to, if any.
    pub fn step(&self) -> Option<Step> {
        match self {
            UpdateError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying error with any step attribution removed.
    pub fn root(&self) -> &UpdateError {
        match self {
            UpdateError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), UpdateError::Cancelled)
    }
}

/// Result of one self-update attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub updated: bool,
    pub version: String,
    pub date: DateTime<Utc>,
    pub changelog: String,
}

impl UpdateOutcome {
    fn from_release(release: &Release, updated: bool) -> Self {
        Self {
            updated,
            version: release.version.clone(),
            date: release.published_at,
            changelog: release.changelog.clone(),
        }
    }
}

/// Drives the update pipeline for one executable.
#[derive(Debug, Clone)]
pub struct Updater {
    http: reqwest::Client,
    release_url: String,
    current_version: String,
    platform: Platform,
    tool: String,
    target: PathBuf,
    scratch_root: PathBuf,
    force: bool,
}

impl Updater {
    /// Updater replacing `target`, downloading into per-run directories
    /// below `scratch_root`.
    pub fn new(scratch_root: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            release_url: constants::GITHUB_RELEASES_LATEST_API.to_string(),
            current_version: constants::VERSION.to_string(),
            platform: Platform::current(),
            tool: constants::APP_NAME.to_string(),
            target: target.into(),
            scratch_root: scratch_root.into(),
            force: false,
        }
    }

    /// Updater for the running executable using the standard data layout.
    pub fn for_current_exe(paths: &Paths) -> Result<Self, UpdateError> {
        let exe = std::env::current_exe().map_err(UpdateError::CurrentExe)?;
        let exe = exe.canonicalize().unwrap_or(exe);
        Ok(Self::new(paths.updates_dir(), exe))
    }

    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Reinstall even when the latest release is not newer.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run the pipeline. `cancel` aborts everything up to the point where
    /// the executable is replaced.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<UpdateOutcome, UpdateError> {
        self.platform.check_supported()?;
        if release::is_development_version(&self.current_version) {
            return Err(UpdateError::DevelopmentBuild(self.current_version.clone()));
        }

        info!(url = %self.release_url, current = %self.current_version, "checking for updates");
        let client = ReleaseClient::with_http(self.http.clone(), &self.release_url);
        let release = cancellable(cancel, client.fetch_latest())
            .await
            .map_err(|e| e.at(Step::ResolveLatest))?;

        let newer = release::compare_versions(&release.version, &self.current_version)
            .map_err(|e| e.at(Step::CompareVersion))?;
        if !newer && !self.force {
            info!(latest = %release.version, "already up to date");
            return Ok(UpdateOutcome::from_release(&release, false));
        }

        let asset = release::select_asset_for_platform(&release.assets, &self.platform)
            .map_err(|e| e.at(Step::SelectAssets))?;
        let manifest = release::select_checksums_asset(&release.assets)
            .map_err(|e| e.at(Step::SelectAssets))?;

        replace::check_write_permission(&self.target).map_err(|e| e.at(Step::ApplyUpdate))?;

        let scratch =
            ScratchDir::create(&self.scratch_root).map_err(|e| e.at(Step::DownloadAssets))?;
        let asset_path = scratch.path().join(local_name(&asset.name));
        let manifest_path = scratch.path().join(local_name(&manifest.name));

        info!(asset = %asset.name, version = %release.version, "downloading release");
        download::download_to(&self.http, &manifest.download_url, &manifest_path, cancel)
            .await
            .map_err(|e| e.at(Step::DownloadAssets))?;
        download::download_to(&self.http, &asset.download_url, &asset_path, cancel)
            .await
            .map_err(|e| e.at(Step::DownloadAssets))?;

        checksum::verify(&asset_path, &manifest_path, &self.platform)
            .map_err(|e| e.at(Step::VerifyChecksum))?;
        debug!(asset = %asset.name, "checksum verified");

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled.at(Step::UnpackArchive));
        }
        let executable = archive::unpack(&asset_path, &self.tool, &self.platform)
            .map_err(|e| e.at(Step::UnpackArchive))?;

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled.at(Step::ApplyUpdate));
        }
        replace::replace_executable(&self.target, &executable)
            .map_err(|e| e.at(Step::ApplyUpdate))?;

        info!(version = %release.version, target = %self.target.display(), "update applied");
        Ok(UpdateOutcome::from_release(&release, true))
    }
}

/// Race `fut` against cancellation.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, UpdateError>>,
) -> Result<T, UpdateError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UpdateError::Cancelled),
        res = fut => res,
    }
}

/// Asset names come from the network; only their final component is used
/// as a local file name.
fn local_name(asset_name: &str) -> String {
    Path::new(asset_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "asset".to_string())
}

/// Per-run download directory, removed when dropped.
#[derive(Debug)]
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(root: &Path) -> Result<Self, UpdateError> {
        let path = root.join(uuid::Uuid::new_v4().to_string());
        paths::create_private_dir(&path)
            .map_err(|e| UpdateError::fs("create scratch directory", &path, e))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            debug!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
        }
    }
}
