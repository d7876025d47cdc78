//! drivebay - A cloud-drive backend: file and folder metadata, trash,
//! search, share links, and content retrieval over pluggable object storage.
//!
//! - Swappable object storage backends (local filesystem, S3-compatible, GCS)
//! - Tiered retrieval: signed URL, proxied stream, inline data URL for small images
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod object_store;
pub mod retrieval;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
