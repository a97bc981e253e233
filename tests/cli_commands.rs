//! Integration tests for the new, config, upload and files commands.
//!
//! These tests exercise the library functions that back each command,
//! using the public API from the minly crate.

use std::path::Path;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use minly::config::{self, ConfigError, ProjectConfig};
use minly::env::Env;
use minly::lastrun;
use minly::paths::Paths;
use minly::secrets::{MemoryStore, SecretKey, SecretStore};
use minly::shortener::YourlsClient;
use minly::storage::{ObjectStorage, PresignedLink, StorageError};
use minly::store::LinkStore;
use minly::upload::{self, UploadError};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_env() -> Env {
    Env::mock(Vec::<(&str, &str)>::new())
}

fn sample_config(name: &str) -> ProjectConfig {
    let mut config = ProjectConfig::new(name);
    config.storage.endpoint = "minio.internal:9000".to_string();
    config.storage.use_ssl = false;
    config.shortener.endpoint = "https://sho.rt/yourls-api.php".to_string();
    config
}

// ---------------------------------------------------------------------------
// new / configs / config
// ---------------------------------------------------------------------------

#[test]
fn new_project_is_listed_and_loadable() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());

    sample_config("photos").save(&paths).unwrap();
    sample_config("backup").save(&paths).unwrap();

    assert_eq!(config::list_saved(&paths).unwrap(), vec!["backup", "photos"]);

    let loaded = ProjectConfig::load(&paths, "photos", &no_env()).unwrap();
    assert_eq!(loaded.storage.bucket, "photos");
    assert_eq!(loaded.storage.endpoint_url(), "http://minio.internal:9000");
}

#[test]
fn project_selection_needs_a_hint_when_ambiguous() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    sample_config("photos").save(&paths).unwrap();
    sample_config("backup").save(&paths).unwrap();

    assert!(matches!(
        config::resolve_project(&paths, None, &no_env()),
        Err(ConfigError::Ambiguous(_))
    ));

    let env = Env::mock([("MINLY_PROJECT", "backup")]);
    assert_eq!(config::resolve_project(&paths, None, &env).unwrap(), "backup");
    assert_eq!(
        config::resolve_project(&paths, Some("photos"), &env).unwrap(),
        "photos"
    );
}

#[test]
fn environment_overrides_saved_values() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    sample_config("photos").save(&paths).unwrap();

    let env = Env::mock([
        ("MINLY_STORAGE_BUCKET", "sharedbucket"),
        ("MINLY_LINK_EXPIRY_HOURS", "72"),
        ("MINLY_STORAGE_USE_SSL", "not-a-bool"),
    ]);
    let loaded = ProjectConfig::load(&paths, "photos", &env).unwrap();

    assert_eq!(loaded.storage.bucket, "sharedbucket");
    assert_eq!(loaded.storage.link_expiry_hours, 72);
    assert!(!loaded.storage.use_ssl, "invalid override is ignored");
}

#[test]
fn invalid_environment_override_fails_loading() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    sample_config("photos").save(&paths).unwrap();

    let env = Env::mock([("MINLY_STORAGE_BUCKET", "shared-bucket")]);
    match ProjectConfig::load(&paths, "photos", &env) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "storage.bucket"),
        other => panic!("expected invalid bucket, got {other:?}"),
    }
}

#[test]
fn project_flag_cannot_escape_configs_dir() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path().join("data"));
    let outside = home.path().join("x.toml");
    std::fs::write(&outside, "keep").unwrap();

    assert!(config::resolve_project(&paths, Some("../../x"), &no_env()).is_err());
    assert!(outside.exists());
}

#[test]
fn import_rejects_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.toml");

    let mut config = sample_config("photos");
    config.storage.link_expiry_hours = 500;
    std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

    assert!(matches!(
        ProjectConfig::from_file(&path),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn import_then_save_round_trips_through_disk() {
    let source = tempfile::tempdir().unwrap();
    let export = source.path().join("photos.toml");
    std::fs::write(&export, toml::to_string(&sample_config("photos")).unwrap()).unwrap();

    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    let imported = ProjectConfig::from_file(&export).unwrap();
    imported.save(&paths).unwrap();

    assert_eq!(
        ProjectConfig::load(&paths, "photos", &no_env()).unwrap(),
        imported
    );
}

#[test]
fn delete_removes_config_and_secrets() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    sample_config("photos").save(&paths).unwrap();
    let secrets = MemoryStore::with([
        (SecretKey::StorageAccessKey, "AKIA"),
        (SecretKey::StorageSecretKey, "secret"),
    ]);

    assert!(config::delete(&paths, "photos").unwrap());
    assert_eq!(secrets.delete_all().unwrap(), 2);

    assert!(config::list_saved(&paths).unwrap().is_empty());
    assert!(!config::delete(&paths, "photos").unwrap());
    assert!(secrets.get(SecretKey::StorageAccessKey).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// upload / files
// ---------------------------------------------------------------------------

struct StaticStorage;

#[async_trait]
impl ObjectStorage for StaticStorage {
    async fn upload(&self, path: &Path) -> Result<PresignedLink, StorageError> {
        let name = path.file_name().unwrap().to_string_lossy();
        Ok(PresignedLink {
            url: format!("https://minio.internal/photos/{name}?X-Amz-Signature=f00"),
            expires_at: Utc::now() + Duration::hours(24),
        })
    }
}

#[tokio::test]
async fn upload_records_short_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/yourls-api.php"))
        .and(body_string_contains("action=shorturl"))
        .and(body_string_contains("signature=sig-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "shorturl": "https://sho.rt/abc",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("cat.png");
    std::fs::write(&file, b"png").unwrap();
    let store = LinkStore::new(dir.path().join("storages").join("photos"));
    let shortener = YourlsClient::new(
        format!("{}/yourls-api.php", server.uri()),
        "sig-123",
        "Uploaded with minly",
    );

    let record = upload::upload_file(&StaticStorage, &shortener, &store, &file)
        .await
        .unwrap();

    assert_eq!(record.short_link, "https://sho.rt/abc");
    assert!(record.storage_link.contains("cat.png"));
    assert_eq!(store.load_all().unwrap(), vec![record]);
}

#[tokio::test]
async fn rejected_shortening_records_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "status": "fail",
            "code": "error:url",
            "message": "Missing or malformed URL",
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("cat.png");
    std::fs::write(&file, b"png").unwrap();
    let store = LinkStore::new(dir.path().join("links"));
    let shortener = YourlsClient::new(server.uri(), "sig", "title");

    let err = upload::upload_file(&StaticStorage, &shortener, &store, &file)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Shorten(_)));
    assert!(store.load_all().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// last run
// ---------------------------------------------------------------------------

#[test]
fn failed_run_is_reported_once_overwritten() {
    let home = tempfile::tempdir().unwrap();
    let paths = Paths::at(home.path());
    assert!(lastrun::read(&paths).is_none());

    lastrun::write(&paths, Some("upload failed: bucket missing")).unwrap();
    let previous = lastrun::read(&paths).unwrap();
    assert!(previous.failed());
    assert_eq!(previous.error, "upload failed: bucket missing");

    lastrun::write(&paths, None).unwrap();
    assert!(!lastrun::read(&paths).unwrap().failed());
}
