//! Cloudflare R2 image store.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use scrub_models::RemoteImageRef;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::image_store::{DeleteOutcome, ImageStore};

/// Configuration for the R2 image store.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL serving the bucket (custom domain or r2.dev)
    pub public_url: String,
    /// Key prefix for uploaded sheets
    pub key_prefix: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: std::env::var("R2_PUBLIC_URL")
                .map_err(|_| StorageError::config_error("R2_PUBLIC_URL not set"))?,
            key_prefix: std::env::var("R2_KEY_PREFIX").unwrap_or_else(|_| "sheets".to_string()),
        })
    }

    /// Like [`R2Config::from_env`], but `Ok(None)` when R2 is not configured
    /// at all (no `R2_ENDPOINT_URL`).
    pub fn from_env_optional() -> StorageResult<Option<Self>> {
        if std::env::var("R2_ENDPOINT_URL").is_err() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }

    /// Object key for a file uploaded under this config.
    fn object_key(&self, file_name: &str) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        let unique = format!("{}-{}", Uuid::new_v4().simple(), file_name);
        if prefix.is_empty() {
            unique
        } else {
            format!("{}/{}", prefix, unique)
        }
    }

    fn public_base(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

/// Sheet image store backed by an R2 bucket.
#[derive(Clone)]
pub struct R2ImageStore {
    client: Client,
    config: R2Config,
}

impl R2ImageStore {
    /// Create a new R2 store from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl ImageStore for R2ImageStore {
    async fn upload(&self, path: &Path) -> StorageResult<RemoteImageRef> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        let key = self.config.object_key(&file_name);
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(&key)
            .body(body)
            .content_type(content_type_for(&file_name))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(RemoteImageRef {
            url: format!("{}/{}", self.config.public_base(), key),
            id: key,
        })
    }

    async fn delete(&self, id: &str) -> StorageResult<DeleteOutcome> {
        debug!("Deleting {}", id);

        // S3 deletes succeed for missing keys, so probe first to report it.
        let head = self
            .client
            .head_object()
            .bucket(&self.config.bucket_name)
            .key(id)
            .send()
            .await;
        if let Err(e) = head {
            if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                return Ok(DeleteOutcome::NotFound);
            }
            return Err(StorageError::AwsSdk(e.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket_name)
            .key(id)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(DeleteOutcome::Deleted)
    }

    fn id_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.config.public_base())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}
