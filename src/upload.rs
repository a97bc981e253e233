//! Upload flow: store the file, shorten its link, record the result.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::shortener::{ShortenError, Shortener};
use crate::storage::{ObjectStorage, StorageError};
use crate::store::{LinkRecord, LinkStore, StoreError};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload failed")]
    Storage(#[from] StorageError),

    #[error("shortening failed")]
    Shorten(#[from] ShortenError),

    #[error("recording the link failed")]
    Record(#[from] StoreError),
}

/// Upload `path`, shorten the presigned link and append the record to
/// `store`. The appended record is returned.
pub async fn upload_file(
    storage: &dyn ObjectStorage,
    shortener: &dyn Shortener,
    store: &LinkStore,
    path: &Path,
) -> Result<LinkRecord, UploadError> {
    let link = storage.upload(path).await?;
    let short = shortener.shorten(&link.url).await?;

    let record = LinkRecord::new(link.url, link.expires_at, short);
    store.append(&record)?;

    info!(
        id = %record.id,
        file = %path.display(),
        expires_at = %record.storage_link_expires_at,
        "upload recorded"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PresignedLink;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    struct FakeStorage;

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn upload(&self, path: &Path) -> Result<PresignedLink, StorageError> {
            Ok(PresignedLink {
                url: format!("https://s3.local/bucket/{}?X-Amz-Signature=x", path.display()),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    #[derive(Default)]
    struct FakeShortener {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Shortener for FakeShortener {
        async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
            if self.fail {
                return Err(ShortenError::Rejected {
                    message: "nope".to_string(),
                });
            }
            self.seen.lock().unwrap().push(url.to_string());
            Ok("https://sho.rt/x".to_string())
        }
    }

    #[tokio::test]
    async fn records_successful_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = LinkStore::new(dir.path());
        let shortener = FakeShortener::default();

        let record = upload_file(&FakeStorage, &shortener, &store, Path::new("a.txt"))
            .await
            .unwrap();

        assert_eq!(record.short_link, "https://sho.rt/x");
        assert_eq!(shortener.seen.lock().unwrap()[0], record.storage_link);
        assert_eq!(store.load_all().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn shortener_failure_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LinkStore::new(dir.path());
        let shortener = FakeShortener {
            fail: true,
            ..FakeShortener::default()
        };

        let err = upload_file(&FakeStorage, &shortener, &store, Path::new("a.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Shorten(_)));
        assert!(store.load_all().unwrap().is_empty());
    }
}
