//! S3-compatible object storage.
//!
//! Uploads go to the project bucket under a random key, and the caller gets
//! back a presigned GET link valid for the configured expiry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("bucket '{bucket}' unavailable: {message}")]
    Bucket { bucket: String, message: String },

    #[error("upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    #[error("presigning '{key}' failed: {message}")]
    Presign { key: String, message: String },
}

/// A time-limited download link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedLink {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Somewhere files can be uploaded to and shared from.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<PresignedLink, StorageError>;
}

/// S3 API client with static credentials and path-style addressing.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    link_expiry: Duration,
}

impl S3Storage {
    pub fn new(config: &StorageConfig, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "minly");
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            // Required for MinIO and most S3-compatible services
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            link_expiry: config.link_expiry(),
        }
    }

    /// Create the bucket unless it already exists.
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!(bucket = %self.bucket, "bucket is accessible");
                return Ok(());
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    return Err(StorageError::Bucket {
                        bucket: self.bucket.clone(),
                        message: DisplayErrorContext(&service_error).to_string(),
                    });
                }
            }
        }

        info!(bucket = %self.bucket, region = %self.region, "creating bucket");
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| StorageError::Bucket {
                bucket: self.bucket.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn presign(&self, key: &str) -> Result<PresignedLink, StorageError> {
        let presign_err = |message: String| StorageError::Presign {
            key: key.to_string(),
            message,
        };
        let presigning = PresigningConfig::expires_in(self.link_expiry)
            .map_err(|e| presign_err(e.to_string()))?;
        let issued_at = Utc::now();
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| presign_err(DisplayErrorContext(&e).to_string()))?;

        let expires_at = issued_at
            + chrono::Duration::from_std(self.link_expiry)
                .map_err(|e| presign_err(e.to_string()))?;
        Ok(PresignedLink {
            url: request.uri().to_string(),
            expires_at,
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, path: &Path) -> Result<PresignedLink, StorageError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| StorageError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(StorageError::NotAFile(path.to_path_buf()));
        }

        self.ensure_bucket().await?;

        let key = object_key(path);
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        info!(bucket = %self.bucket, %key, bytes = metadata.len(), "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type(path))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        self.presign(&key).await
    }
}

/// Random object key keeping the file's extension.
pub fn object_key(path: &Path) -> String {
    let id = uuid::Uuid::new_v4();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}

pub fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
