//! Retrieval tier resolution: turn a stored object into something a
//! client can fetch.
//!
//! Tiers are tried in order, first success wins: a backend-issued signed
//! URL offloads bandwidth to the storage service and is the common case;
//! the proxy tier streams bytes through this server when the backend
//! cannot sign (e.g. a local store with no public URL); the inline tier
//! folds small images into a `data:` URL so previews render without a
//! second round-trip. A tier's failure is logged and the next tier tried;
//! only exhausting the whole plan surfaces an error.

use std::time::Duration;

use base64::Engine;
use futures::StreamExt;
use thiserror::Error;

use crate::object_store::{ObjectStore, ObjectStoreError, ObjectStream};
use crate::storage::models::FileRecord;

/// Images at or above this size are never inlined as data URLs.
pub const INLINE_IMAGE_LIMIT: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Download failed: no retrieval tier succeeded")]
    DownloadFailed,
    #[error("Preview unavailable: no retrieval tier succeeded")]
    PreviewUnavailable,
}

/// A successful resolution: exactly one of the three tiers' outputs.
#[derive(Debug)]
pub enum Resolved {
    /// Backend-issued time-limited URL (tier 1)
    Url(String),
    /// Open byte stream to pipe through our own response (tier 2)
    Stream(ObjectStream),
    /// Fully materialized `data:` URL (tier 3, preview-only)
    DataUrl(String),
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Inline,
    SignedUrl,
    Proxy,
}

const DOWNLOAD_TIERS: &[Tier] = &[Tier::SignedUrl, Tier::Proxy];
const PREVIEW_TIERS: &[Tier] = &[Tier::Inline, Tier::SignedUrl, Tier::Proxy];

/// Resolve a file for download: signed URL, then proxied stream.
pub async fn resolve_download(
    store: &dyn ObjectStore,
    file: &FileRecord,
    expires_in: Duration,
) -> Result<Resolved, RetrievalError> {
    run_tiers(DOWNLOAD_TIERS, store, file, expires_in)
        .await
        .ok_or(RetrievalError::DownloadFailed)
}

/// Resolve a file for preview: inline data URL when the size/type gate
/// passes, then signed URL, then proxied stream.
pub async fn resolve_preview(
    store: &dyn ObjectStore,
    file: &FileRecord,
    expires_in: Duration,
) -> Result<Resolved, RetrievalError> {
    run_tiers(PREVIEW_TIERS, store, file, expires_in)
        .await
        .ok_or(RetrievalError::PreviewUnavailable)
}

/// The inline gate: only small images qualify for the data-URL tier.
pub fn inline_eligible(file: &FileRecord) -> bool {
    file.mime_type.starts_with("image/") && file.size < INLINE_IMAGE_LIMIT
}

async fn run_tiers(
    tiers: &[Tier],
    store: &dyn ObjectStore,
    file: &FileRecord,
    expires_in: Duration,
) -> Option<Resolved> {
    for tier in tiers {
        match attempt(*tier, store, file, expires_in).await {
            Ok(Some(resolved)) => return Some(resolved),
            Ok(None) => {} // tier not applicable to this file
            Err(e) => {
                tracing::warn!(
                    key = %file.key,
                    tier = ?tier,
                    error = %e,
                    "Retrieval tier failed, trying next"
                );
            }
        }
    }
    None
}

async fn attempt(
    tier: Tier,
    store: &dyn ObjectStore,
    file: &FileRecord,
    expires_in: Duration,
) -> Result<Option<Resolved>, ObjectStoreError> {
    match tier {
        Tier::SignedUrl => {
            let url = store
                .signed_url(&file.key, &file.mime_type, expires_in)
                .await?;
            Ok(Some(Resolved::Url(url)))
        }
        Tier::Proxy => {
            let stream = store.get_stream(&file.key).await?;
            Ok(Some(Resolved::Stream(stream)))
        }
        Tier::Inline => {
            if !inline_eligible(file) {
                return Ok(None);
            }
            let object = store.get_stream(&file.key).await?;
            let bytes = collect(object).await?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(Some(Resolved::DataUrl(format!(
                "data:{};base64,{encoded}",
                file.mime_type
            ))))
        }
    }
}

async fn collect(object: ObjectStream) -> Result<Vec<u8>, ObjectStoreError> {
    let mut buf = Vec::with_capacity(object.content_length.unwrap_or(0) as usize);
    let mut stream = object.stream;
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;

    use crate::object_store::{object_key, ObjectMeta};
    use crate::testutil::test_state;

    /// Store whose signing and streaming can be made to fail independently.
    struct StubStore {
        data: Bytes,
        signing_fails: bool,
        streaming_fails: bool,
    }

    #[async_trait]
    impl ObjectStore for StubStore {
        async fn put(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> Result<(), ObjectStoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), ObjectStoreError> {
            Ok(())
        }

        async fn get_stream(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
            if self.streaming_fails {
                return Err(ObjectStoreError::Backend("stream unavailable".to_string()));
            }
            let data = self.data.clone();
            Ok(ObjectStream {
                content_length: Some(data.len() as u64),
                content_type: crate::object_store::content_type_for_key(key),
                stream: Box::pin(futures::stream::once(async move { Ok(data) })),
            })
        }

        async fn head(&self, _key: &str) -> Result<ObjectMeta, ObjectStoreError> {
            Ok(ObjectMeta {
                size: self.data.len() as u64,
                last_modified: None,
            })
        }

        async fn signed_url(
            &self,
            key: &str,
            _content_type: &str,
            _expires_in: Duration,
        ) -> Result<String, ObjectStoreError> {
            if self.signing_fails {
                return Err(ObjectStoreError::SigningUnavailable(
                    "no signer".to_string(),
                ));
            }
            Ok(format!("https://storage.test/{key}?sig=abc"))
        }
    }

    fn sample_file(name: &str, mime_type: &str, size: u64) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            key: object_key("user-1", name),
            bucket: "test".to_string(),
            owner_id: "user-1".to_string(),
            folder_id: None,
            checksum: "deadbeef".to_string(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    const EXPIRY: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn download_prefers_signed_url() {
        let store = StubStore {
            data: Bytes::from("pdf bytes"),
            signing_fails: false,
            streaming_fails: false,
        };
        let file = sample_file("report.pdf", "application/pdf", 9);

        match resolve_download(&store, &file, EXPIRY).await.unwrap() {
            Resolved::Url(url) => assert!(url.contains(&file.key)),
            _ => panic!("expected signed URL"),
        }
    }

    #[tokio::test]
    async fn download_falls_back_to_proxy_when_signing_fails() {
        let store = StubStore {
            data: Bytes::from("pdf bytes"),
            signing_fails: true,
            streaming_fails: false,
        };
        let file = sample_file("report.pdf", "application/pdf", 9);

        match resolve_download(&store, &file, EXPIRY).await.unwrap() {
            Resolved::Stream(s) => assert_eq!(s.content_length, Some(9)),
            _ => panic!("expected proxied stream"),
        }
    }

    #[tokio::test]
    async fn download_fails_when_all_tiers_fail() {
        let store = StubStore {
            data: Bytes::new(),
            signing_fails: true,
            streaming_fails: true,
        };
        let file = sample_file("report.pdf", "application/pdf", 9);

        let err = resolve_download(&store, &file, EXPIRY).await.unwrap_err();
        assert!(matches!(err, RetrievalError::DownloadFailed));
    }

    #[tokio::test]
    async fn preview_inlines_small_image() {
        let store = StubStore {
            data: Bytes::from_static(b"\x89PNG fake"),
            signing_fails: false,
            streaming_fails: false,
        };
        let file = sample_file("photo.png", "image/png", 9);

        match resolve_preview(&store, &file, EXPIRY).await.unwrap() {
            Resolved::DataUrl(url) => assert!(url.starts_with("data:image/png;base64,")),
            _ => panic!("expected data URL"),
        }
    }

    #[tokio::test]
    async fn preview_skips_inline_for_non_image() {
        let store = StubStore {
            data: Bytes::from("plain text"),
            signing_fails: false,
            streaming_fails: false,
        };
        let file = sample_file("notes.txt", "text/plain", 10);

        match resolve_preview(&store, &file, EXPIRY).await.unwrap() {
            Resolved::Url(_) => {}
            _ => panic!("expected signed URL"),
        }
    }

    #[tokio::test]
    async fn preview_skips_inline_at_exact_size_limit() {
        let store = StubStore {
            data: Bytes::new(),
            signing_fails: false,
            streaming_fails: false,
        };
        // Exactly at the limit is not "under" it
        let file = sample_file("big.png", "image/png", INLINE_IMAGE_LIMIT);
        assert!(!inline_eligible(&file));

        match resolve_preview(&store, &file, EXPIRY).await.unwrap() {
            Resolved::Url(_) => {}
            _ => panic!("expected signed URL"),
        }

        let under = sample_file("small.png", "image/png", INLINE_IMAGE_LIMIT - 1);
        assert!(inline_eligible(&under));
    }

    #[tokio::test]
    async fn preview_falls_through_to_proxy_when_inline_and_signing_fail() {
        let store = StubStore {
            data: Bytes::from("plain text"),
            signing_fails: true,
            streaming_fails: false,
        };
        let file = sample_file("notes.txt", "text/plain", 10);

        match resolve_preview(&store, &file, EXPIRY).await.unwrap() {
            Resolved::Stream(_) => {}
            _ => panic!("expected proxied stream"),
        }
    }

    #[tokio::test]
    async fn proxy_round_trip_through_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut file = sample_file("a.txt", "text/plain", 10);
        state
            .object_store
            .put(&file.key, Bytes::from("0123456789"), "text/plain")
            .await
            .unwrap();
        file.size = 10;

        // Local store has no public URL, so downloads go through the proxy tier
        match resolve_download(state.object_store.as_ref(), &file, EXPIRY)
            .await
            .unwrap()
        {
            Resolved::Stream(object) => {
                assert_eq!(object.content_type, "text/plain");
                let bytes = collect(object).await.unwrap();
                assert_eq!(bytes, b"0123456789");
            }
            _ => panic!("expected proxied stream"),
        }
    }
}
