use std::time::Duration;

use bytes::Bytes;
use drivebay::object_store::{content_type_for_key, object_key, LocalStore, ObjectStore};
use futures::StreamExt;

async fn collect(store: &LocalStore, key: &str) -> (String, Option<u64>, Vec<u8>) {
    let object = store.get_stream(key).await.unwrap();
    let mut buf = Vec::new();
    let mut stream = object.stream;
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk.unwrap());
    }
    (object.content_type, object.content_length, buf)
}

#[tokio::test]
async fn test_local_store_put_get_stream() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    let data = Bytes::from("hello world");
    store.put("test-key.txt", data.clone(), "text/plain").await.unwrap();

    let (content_type, content_length, bytes) = collect(&store, "test-key.txt").await;
    assert_eq!(content_type, "text/plain");
    assert_eq!(content_length, Some(data.len() as u64));
    assert_eq!(bytes, data);
}

#[tokio::test]
async fn test_local_store_put_creates_nested_prefixes() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    store
        .put("user-1/abc.png", Bytes::from("png bytes"), "image/png")
        .await
        .unwrap();

    let (content_type, _, bytes) = collect(&store, "user-1/abc.png").await;
    assert_eq!(content_type, "image/png");
    assert_eq!(bytes, b"png bytes");
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    store.put("k.txt", Bytes::from("one"), "text/plain").await.unwrap();
    store.put("k.txt", Bytes::from("two"), "text/plain").await.unwrap();

    let (_, _, bytes) = collect(&store, "k.txt").await;
    assert_eq!(bytes, b"two");
}

#[tokio::test]
async fn test_local_store_head() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    store
        .put("sized.bin", Bytes::from(vec![0u8; 2048]), "application/octet-stream")
        .await
        .unwrap();

    let meta = store.head("sized.bin").await.unwrap();
    assert_eq!(meta.size, 2048);
    assert!(meta.last_modified.is_some());
}

#[tokio::test]
async fn test_local_store_get_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    let err = store.get_stream("missing.txt").await.unwrap_err();
    assert!(err.to_string().contains("missing.txt"));
}

#[tokio::test]
async fn test_local_store_delete_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), None).unwrap();

    store.put("gone.txt", Bytes::from("data"), "text/plain").await.unwrap();
    store.delete("gone.txt").await.unwrap();
    // Second delete of an absent key still succeeds
    store.delete("gone.txt").await.unwrap();

    assert!(store.get_stream("gone.txt").await.is_err());
}

#[tokio::test]
async fn test_local_store_signed_url_requires_public_url() {
    let dir = tempfile::tempdir().unwrap();

    let unsigned = LocalStore::new(dir.path(), None).unwrap();
    assert!(unsigned
        .signed_url("k.txt", "text/plain", Duration::from_secs(60))
        .await
        .is_err());

    let signed = LocalStore::new(dir.path(), Some("https://cdn.example.com/".to_string())).unwrap();
    let url = signed
        .signed_url("user-1/k.txt", "text/plain", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(url, "https://cdn.example.com/user-1/k.txt");
}

#[test]
fn test_object_key_format() {
    let key = object_key("user-1", "vacation photo.JPG");
    assert!(key.starts_with("user-1/"));
    assert!(key.ends_with(".JPG"));
    // The generated portion is a UUID, not the original name
    assert!(!key.contains("vacation"));

    let bare = object_key("user-1", "README");
    assert!(bare.starts_with("user-1/"));
    assert!(!bare.contains('.'));

    // Dotfiles keep no extension
    let dotfile = object_key("user-1", ".gitignore");
    assert!(!dotfile.ends_with(".gitignore"));
}

#[test]
fn test_object_key_uniqueness() {
    let a = object_key("user-1", "same.txt");
    let b = object_key("user-1", "same.txt");
    assert_ne!(a, b);
}

#[test]
fn test_content_type_for_key() {
    assert_eq!(content_type_for_key("u/abc.png"), "image/png");
    assert_eq!(content_type_for_key("u/abc.pdf"), "application/pdf");
    assert_eq!(content_type_for_key("u/abc"), "application/octet-stream");
}
