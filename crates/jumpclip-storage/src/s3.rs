//! S3-compatible blob store (AWS S3, Cloudflare R2, MinIO).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::SdkConfig;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; enables path-style addressing
    pub endpoint_url: Option<String>,
    /// Static credentials; the default AWS provider chain is used when absent
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Public base URL objects are served from, if not the endpoint itself
    pub public_url: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let bucket = std::env::var("S3_BUCKET")
            .map_err(|_| StorageError::config_error("S3_BUCKET not set"))?;
        if bucket.is_empty() {
            return Err(StorageError::config_error("S3_BUCKET cannot be empty"));
        }

        Ok(Self {
            bucket,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: non_empty_var("S3_ENDPOINT_URL"),
            access_key_id: non_empty_var("S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("S3_SECRET_ACCESS_KEY"),
            public_url: non_empty_var("S3_PUBLIC_URL"),
        })
    }

    /// URL an uploaded object is reachable at (not signed).
    pub fn object_url(&self, key: &str) -> String {
        match (&self.public_url, &self.endpoint_url) {
            (Some(base), _) => format!("{}/{}", base.trim_end_matches('/'), key),
            (None, Some(endpoint)) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// [`BlobStore`] over the S3 API.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    config: S3Config,
}

impl S3BlobStore {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let static_credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => Some(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "jumpclip-env",
            )),
            (None, None) => None,
            _ => {
                return Err(StorageError::config_error(
                    "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
                ))
            }
        };

        let shared: SdkConfig = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        if let Some(credentials) = static_credentials {
            builder = builder.credentials_provider(credentials);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            config,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn get_object(&self, key: &str) -> StorageResult<GetObjectOutput> {
        self.client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_get_error(key, e))
    }

    async fn put_object(&self, key: &str, body: ByteStream, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|e| StorageError::config_error(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

fn map_get_error<R>(key: &str, err: SdkError<GetObjectError, R>) -> StorageError
where
    R: std::fmt::Debug,
{
    let missing = err
        .as_service_error()
        .map(|se| se.is_no_such_key())
        .unwrap_or(false);
    if missing {
        StorageError::not_found(key)
    } else {
        StorageError::download_failed(format!("{}: {}", key, err))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self.get_object(key).await?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        debug!("Downloading {} to {}", key, dest.display());

        let response = self.get_object(key).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", key, e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Downloaded {} to {} ({} bytes)", key, dest.display(), written);
        Ok(written)
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        debug!("Uploading {} bytes to {}", data.len(), key);
        self.put_object(key, ByteStream::from(data), content_type).await?;
        Ok(self.config.object_url(key))
    }

    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        self.put_object(key, body, content_type).await?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(self.config.object_url(key))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }
}
