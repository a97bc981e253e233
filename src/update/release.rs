//! Latest-release lookup, asset selection and version comparison.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::UpdateError;
use crate::constants::USER_AGENT;
use crate::platform::Platform;

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version tag as published, possibly with a leading `v`.
    pub version: String,
    pub published_at: DateTime<Utc>,
    pub changelog: String,
    pub assets: Vec<Asset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    published_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    body: Option<String>,
    #[serde(default)]
    assets: Vec<Asset>,
}

/// Client for a GitHub `releases/latest` endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    url: String,
}

impl ReleaseClient {
    pub fn with_http(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Fetch the latest release. A single request; no retries.
    pub async fn fetch_latest(&self) -> Result<Release, UpdateError> {
        let resp = self
            .http
            .get(&self.url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| UpdateError::Network {
                url: self.url.clone(),
                source,
            })?;

        if resp.status() != StatusCode::OK {
            return Err(UpdateError::HttpStatus {
                url: self.url.clone(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| UpdateError::Network {
            url: self.url.clone(),
            source,
        })?;
        parse_release(&body)
    }
}

fn parse_release(body: &str) -> Result<Release, UpdateError> {
    let raw: ReleaseResponse = serde_json::from_str(body).map_err(|e| UpdateError::Decode {
        what: "release response",
        reason: e.to_string(),
    })?;

    let published_at =
        raw.published_at
            .or(raw.created_at)
            .ok_or_else(|| UpdateError::Decode {
                what: "release response",
                reason: "missing published_at and created_at".to_string(),
            })?;

    Ok(Release {
        version: raw.tag_name,
        published_at,
        changelog: raw.body.unwrap_or_default(),
        assets: raw.assets,
    })
}

/// Pick the archive built for `platform`. Checksum manifests never qualify.
pub fn select_asset_for_platform<'a>(
    assets: &'a [Asset],
    platform: &Platform,
) -> Result<&'a Asset, UpdateError> {
    assets
        .iter()
        .filter(|a| !is_checksums(&a.name))
        .find(|a| platform.matches(&a.name))
        .ok_or_else(|| UpdateError::NoMatchingAsset {
            os: platform.os().to_string(),
            arch: platform.arch().to_string(),
        })
}

pub fn select_checksums_asset(assets: &[Asset]) -> Result<&Asset, UpdateError> {
    assets
        .iter()
        .find(|a| is_checksums(&a.name))
        .ok_or(UpdateError::ChecksumsAssetNotFound)
}

fn is_checksums(name: &str) -> bool {
    name.to_ascii_lowercase().contains("checksums")
}

/// Returns `true` iff `latest` is a strictly newer semantic version than
/// `current`. A leading `v` on either is ignored.
pub fn compare_versions(latest: &str, current: &str) -> Result<bool, UpdateError> {
    Ok(parse_version(latest)? > parse_version(current)?)
}

fn parse_version(version: &str) -> Result<semver::Version, UpdateError> {
    semver::Version::parse(strip_v(version)).map_err(|source| UpdateError::Version {
        version: version.to_string(),
        source,
    })
}

fn strip_v(version: &str) -> &str {
    let version = version.trim();
    version.strip_prefix('v').unwrap_or(version)
}

/// Development builds never self-update: `dev`, `development`, or any
/// version with a `dev` pre-release identifier.
pub fn is_development_version(version: &str) -> bool {
    let version = strip_v(version);
    if version.eq_ignore_ascii_case("dev") || version.eq_ignore_ascii_case("development") {
        return true;
    }
    semver::Version::parse(version)
        .map(|v| v.pre.as_str().split('.').any(|id| id == "dev"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn asset(name: &str) -> Asset {
        Asset {
            name: name.to_string(),
            content_type: "application/gzip".to_string(),
            download_url: format!("https://example.com/{name}"),
        }
    }

    #[test]
    fn compare_versions_detects_newer() {
        assert!(compare_versions("1.2.0", "1.1.9").unwrap());
        assert!(compare_versions("v2.0.0", "1.9.9").unwrap());
        assert!(compare_versions("1.0.1", "v1.0.0").unwrap());
    }

    #[test]
    fn compare_versions_rejects_equal_or_older() {
        assert!(!compare_versions("1.0.0", "1.0.0").unwrap());
        assert!(!compare_versions("v1.0.0", "1.0.0").unwrap());
        assert!(!compare_versions("0.9.0", "1.0.0").unwrap());
    }

    #[test]
    fn compare_versions_rejects_garbage() {
        let err = compare_versions("not-a-version", "1.0.0").unwrap_err();
        assert!(matches!(err, UpdateError::Version { .. }));
        assert!(compare_versions("1.0.0", "dev").is_err());
    }

    #[test]
    fn development_versions() {
        assert!(is_development_version("dev"));
        assert!(is_development_version("Development"));
        assert!(is_development_version("v1.2.0-dev"));
        assert!(is_development_version("1.2.0-rc.1.dev"));
        assert!(!is_development_version("1.2.0"));
        assert!(!is_development_version("1.2.0-rc.1"));
    }

    #[test]
    fn selects_platform_asset_case_insensitively() {
        let assets = vec![
            asset("minly_Darwin_arm64.tar.gz"),
            asset("minly_Linux_x86_64.tar.gz"),
            asset("minly_Windows_x86_64.zip"),
        ];
        let picked = select_asset_for_platform(&assets, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(picked.name, "minly_Linux_x86_64.tar.gz");

        let picked = select_asset_for_platform(&assets, &Platform::new("macos", "aarch64")).unwrap();
        assert_eq!(picked.name, "minly_Darwin_arm64.tar.gz");
    }

    #[test]
    fn checksums_manifest_is_never_the_platform_asset() {
        let assets = vec![
            asset("minly_linux_x86_64_checksums.txt"),
            asset("minly_Linux_x86_64.tar.gz"),
        ];
        let picked = select_asset_for_platform(&assets, &Platform::new("linux", "x86_64")).unwrap();
        assert_eq!(picked.name, "minly_Linux_x86_64.tar.gz");
        assert_eq!(
            select_checksums_asset(&assets).unwrap().name,
            "minly_linux_x86_64_checksums.txt"
        );
    }

    #[test]
    fn missing_assets_are_reported() {
        let assets = vec![asset("minly_Darwin_arm64.tar.gz")];
        let err = select_asset_for_platform(&assets, &Platform::new("windows", "x86_64")).unwrap_err();
        assert!(matches!(err, UpdateError::NoMatchingAsset { .. }));
        assert!(matches!(
            select_checksums_asset(&assets),
            Err(UpdateError::ChecksumsAssetNotFound)
        ));
    }

    #[test]
    fn parse_release_prefers_published_at() {
        let body = r#"{
            "tag_name": "v1.4.0",
            "created_at": "2024-01-01T00:00:00Z",
            "published_at": "2024-01-02T10:00:00Z",
            "body": "Fixes",
            "assets": [{
                "name": "checksums.txt",
                "content_type": "text/plain",
                "browser_download_url": "https://example.com/checksums.txt"
            }]
        }"#;
        let release = parse_release(body).unwrap();
        assert_eq!(release.version, "v1.4.0");
        assert_eq!(release.published_at.to_rfc3339(), "2024-01-02T10:00:00+00:00");
        assert_eq!(release.changelog, "Fixes");
        assert_eq!(release.assets.len(), 1);
    }

    #[test]
    fn parse_release_falls_back_to_created_at() {
        let body = r#"{"tag_name":"1.0.0","created_at":"2024-03-01T00:00:00Z","body":null}"#;
        let release = parse_release(body).unwrap();
        assert_eq!(release.published_at.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(release.changelog, "");
        assert!(release.assets.is_empty());
    }

    #[test]
    fn parse_release_requires_a_date() {
        let err = parse_release(r#"{"tag_name":"1.0.0"}"#).unwrap_err();
        assert!(matches!(err, UpdateError::Decode { .. }));
    }

    #[test]
    fn parse_release_rejects_invalid_json() {
        assert!(matches!(
            parse_release("<html>"),
            Err(UpdateError::Decode { .. })
        ));
    }
}
