use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use super::{content_type_for_key, ObjectMeta, ObjectStore, ObjectStoreError, ObjectStream};

/// Local filesystem object store for development and single-host
/// deployments.
pub struct LocalStore {
    base_path: PathBuf,
    /// Base URL under which the base directory is served publicly. When
    /// unset the store cannot issue retrieval URLs and callers fall back
    /// to proxying the bytes themselves.
    public_url: Option<String>,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        public_url: Option<String>,
    ) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Write(e.to_string()))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ObjectStoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(key, "Delete of nonexistent object");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stream(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
        let path = self.object_path(key);
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();

        Ok(ObjectStream {
            stream: ReaderStream::new(file).boxed(),
            content_type: content_type_for_key(key),
            content_length: Some(len),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let path = self.object_path(key);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ObjectMeta {
            size: meta.len(),
            last_modified: meta.modified().ok().map(chrono::DateTime::from),
        })
    }

    async fn signed_url(
        &self,
        key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        match &self.public_url {
            Some(base) => Ok(format!("{base}/{key}")),
            None => Err(ObjectStoreError::SigningUnavailable(
                "local store has no public URL configured".to_string(),
            )),
        }
    }
}
