//! S3-backed object store.
//!
//! Credentials and region come from the standard AWS provider chain
//! (`AWS_ACCESS_KEY_ID`, `AWS_REGION`, profiles, instance metadata).
//! Presigned URLs are native S3 presigned requests.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use docreq_core::{Error, ObjectStore, PresignMethod, Result};

/// Object store backed by one S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let bucket = bucket.into();
        info!(
            subsystem = "storage",
            component = "s3",
            op = "init",
            bucket = %bucket,
            region = ?aws_config.region(),
            "S3 object store configured"
        );
        Self::new(aws_sdk_s3::Client::new(&aws_config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        debug!(
            subsystem = "storage",
            component = "s3",
            op = "put",
            file_key = %key,
            size_bytes = data.len(),
            "Uploading object"
        );
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Error::Storage(format!("failed to write object to s3: {}", e)))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    Error::NotFound(format!("Object not found: {}", key))
                } else {
                    Error::Storage(format!("failed to read object from s3: {}", e))
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(format!("failed to read object body: {}", e)))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        method: PresignMethod,
    ) -> Result<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| Error::Storage(format!("invalid presign expiry: {}", e)))?;

        let presign_err = |e: &dyn std::fmt::Display| {
            Error::Storage(format!("failed to presign s3 {} request: {}", method, e))
        };

        let request = match method {
            PresignMethod::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| presign_err(&e))?,
            PresignMethod::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| presign_err(&e))?,
        };

        Ok(request.uri().to_string())
    }
}
