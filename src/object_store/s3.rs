use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use super::{content_type_for_key, ObjectMeta, ObjectStore, ObjectStoreError, ObjectStream};

/// S3-protocol object store backend. Works against AWS S3 and
/// S3-compatible services (MinIO, R2) via a custom endpoint with
/// path-style addressing.
pub struct S3Store {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub async fn new(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
        access_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            // Custom endpoints (MinIO etc.) generally require path-style
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let size = data.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Write(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        // S3 DeleteObject succeeds for absent keys, which matches the
        // idempotent-delete contract.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_stream(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Backend(service_err.to_string())
                }
            })?;

        let content_type = resp
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| content_type_for_key(key));
        let content_length = resp.content_length().and_then(|len| u64::try_from(len).ok());

        Ok(ObjectStream {
            stream: ReaderStream::new(resp.body.into_async_read()).boxed(),
            content_type,
            content_length,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Backend(service_err.to_string())
                }
            })?;

        let size = resp
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or(0);
        let last_modified = resp
            .last_modified()
            .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos()));

        Ok(ObjectMeta {
            size,
            last_modified,
        })
    }

    async fn signed_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| ObjectStoreError::SigningUnavailable(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| ObjectStoreError::SigningUnavailable(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
