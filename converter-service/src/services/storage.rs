use crate::config::MinioConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use service_core::error::AppError;
use std::path::Path;
use std::time::Duration;

/// Lifetime of links handed out by `/download` and `/share`.
pub const SHARE_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const UPLOAD_RETRY_WINDOW: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Storage: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), AppError>;

    /// Time-limited URL through which the object can be fetched without credentials.
    async fn share_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError>;
}

/// S3-compatible backend (MinIO in the default deployment).
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds a path-style client with static credentials and makes sure the
    /// bucket exists.
    pub async fn connect(config: &MinioConfig) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key().to_string(),
            None,
            None,
            "converter-config",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let storage = Self::new(S3Client::from_conf(s3_config), config.bucket.clone());
        storage.ensure_bucket().await?;
        Ok(storage)
    }

    async fn ensure_bucket(&self) -> Result<(), AppError> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            tracing::debug!(bucket = %self.bucket, "Bucket already exists");
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                AppError::StorageError(anyhow::anyhow!(
                    "Failed to create bucket {}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::info!(bucket = %self.bucket, "Created bucket");
        Ok(())
    }
}

#[async_trait]
impl Storage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), AppError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(UPLOAD_RETRY_WINDOW),
            ..Default::default()
        };

        retry(policy, || async {
            let body = ByteStream::from_path(path).await.map_err(|e| {
                backoff::Error::permanent(AppError::StorageError(anyhow::anyhow!(
                    "Failed to read {} for upload: {}",
                    path.display(),
                    e
                )))
            })?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(
                        bucket = %self.bucket,
                        key = %key,
                        error = %DisplayErrorContext(&e),
                        "Object upload attempt failed"
                    );
                    backoff::Error::transient(AppError::StorageError(anyhow::anyhow!(
                        "S3 upload failed: {}",
                        DisplayErrorContext(&e)
                    )))
                })?;

            Ok::<(), backoff::Error<AppError>>(())
        })
        .await?;

        tracing::info!(bucket = %self.bucket, key = %key, "Uploaded object");
        Ok(())
    }

    async fn share_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(expires_in).map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Invalid presigning window: {}", e))
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::StorageError(anyhow::anyhow!(
                    "Failed to presign {}: {}",
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(request.uri().to_string())
    }
}
