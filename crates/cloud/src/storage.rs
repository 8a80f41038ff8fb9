//! Object storage for attachments that are too large to send inline.
//!
//! The API uploads oversized files through an [`AttachmentStore`] and the
//! bulk mail carries a download link instead of the bytes. [`S3AttachmentStore`]
//! is the production store; tests substitute an in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use courier_core::bulk_mail::{sanitize_filename, HostedAttachment};
use courier_core::types::DbId;

/// Default key prefix for uploaded objects.
const DEFAULT_KEY_PREFIX: &str = "attachments";

/// Default lifetime of presigned download links (7 days, the S3 maximum).
const DEFAULT_LINK_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors from the attachment store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Attachment upload failed: {0}")]
    Upload(String),

    #[error("Could not create download link: {0}")]
    Link(String),
}

/// Stores one attachment and returns where recipients can fetch it.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn store(
        &self,
        owner_id: DbId,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<HostedAttachment, StorageError>;
}

/// S3 bucket settings.
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub key_prefix: String,
    /// When set, links are `{public_base_url}/{key}` instead of presigned URLs.
    pub public_base_url: Option<String>,
    pub link_ttl_secs: u64,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .field("public_base_url", &self.public_base_url)
            .field("link_ttl_secs", &self.link_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl S3Config {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `S3_BUCKET` is not set; oversized attachments are
    /// then rejected instead of hosted.
    ///
    /// | Variable               | Required | Default        |
    /// |------------------------|----------|----------------|
    /// | `S3_BUCKET`            | yes      |                |
    /// | `S3_REGION`            | no       | `us-east-1`    |
    /// | `S3_ENDPOINT`          | no       |                |
    /// | `S3_ACCESS_KEY_ID`     | no       | SDK chain      |
    /// | `S3_SECRET_ACCESS_KEY` | no       | SDK chain      |
    /// | `S3_KEY_PREFIX`        | no       | `attachments`  |
    /// | `S3_PUBLIC_BASE_URL`   | no       |                |
    /// | `S3_LINK_TTL_SECS`     | no       | `604800`       |
    pub fn from_env() -> Option<Self> {
        let bucket = std::env::var("S3_BUCKET").ok()?;
        Some(Self {
            bucket,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").ok(),
            key_prefix: std::env::var("S3_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string()),
            public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok(),
            link_ttl_secs: std::env::var("S3_LINK_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LINK_TTL_SECS)
                .min(DEFAULT_LINK_TTL_SECS),
        })
    }
}

/// Object key for an upload: `{prefix}/{owner}/{random}/{filename}`.
pub fn object_key(prefix: &str, owner_id: DbId, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        prefix.trim_matches('/'),
        owner_id,
        uuid::Uuid::new_v4().simple(),
        sanitize_filename(filename),
    )
}

/// [`AttachmentStore`] backed by an S3 bucket.
pub struct S3AttachmentStore {
    client: aws_sdk_s3::Client,
    config: S3Config,
}

impl S3AttachmentStore {
    /// Build the SDK client. Static keys from the config take precedence
    /// over the default AWS credential chain.
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "courier-env",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint.is_some())
            .build();

        tracing::info!(bucket = %config.bucket, region = %config.region, "S3 attachment store ready");
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            config,
        }
    }

    async fn link_for(&self, key: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.config.public_base_url {
            return Ok(format!("{}/{}", base.trim_end_matches('/'), key));
        }

        let presigning = PresigningConfig::expires_in(Duration::from_secs(self.config.link_ttl_secs))
            .map_err(|e| StorageError::Link(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Link(e.to_string()))?;
        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl AttachmentStore for S3AttachmentStore {
    async fn store(
        &self,
        owner_id: DbId,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<HostedAttachment, StorageError> {
        let key = object_key(&self.config.key_prefix, owner_id, filename);
        let size_bytes = bytes.len() as u64;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .content_disposition(format!(
                "attachment; filename=\"{}\"",
                sanitize_filename(filename).replace('"', "")
            ))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let url = self.link_for(&key).await?;
        tracing::info!(owner_id, key = %key, size_bytes, "Attachment hosted");

        Ok(HostedAttachment {
            filename: sanitize_filename(filename),
            url,
            size_bytes,
        })
    }
}
