mod gcs;
mod local;
mod s3;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use s3::S3Store;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

/// Fallback signed-URL lifetime when no expiry is configured.
pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Write failed: {0}")]
    Write(String),
    #[error("Signed URLs unavailable: {0}")]
    SigningUnavailable(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// An open byte stream for an object, plus what a caller needs to relay
/// it over HTTP.
pub struct ObjectStream {
    pub stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    pub content_type: String,
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Abstraction over object storage backends.
///
/// Implementations must be behaviorally substitutable: routes are written
/// against this contract and never branch on which backend is active.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, creating any intermediate prefixes implicitly.
    /// Callers always supply freshly generated keys, so overwrite
    /// collisions are not an expected case.
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Remove an object. Deletes are idempotent: an already-absent key is
    /// treated as success and the anomaly is logged, not surfaced.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Open the object as a readable byte stream with resolved content
    /// type and (when known) content length.
    async fn get_stream(&self, key: &str) -> Result<ObjectStream, ObjectStoreError>;

    /// Size and last-modified without transferring bytes.
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError>;

    /// A time-limited URL a client can use to fetch the bytes directly,
    /// without further authentication.
    async fn signed_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, ObjectStoreError>;
}

/// Generate an owner-scoped object key: `{owner_id}/{uuid}.{extension}`.
/// The owner prefix namespaces the backend; the UUID guarantees global
/// uniqueness without a coordination step. Keys are assigned once at
/// upload and never mutated.
pub fn object_key(owner_id: &str, file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{owner_id}/{id}.{ext}")
        }
        _ => format!("{owner_id}/{id}"),
    }
}

/// Infer a MIME type from a key's extension suffix. Used when the backend
/// holds no stored content type for the object.
pub fn content_type_for_key(key: &str) -> String {
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
