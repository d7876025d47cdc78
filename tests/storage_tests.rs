use chrono::{Duration, Utc};
use drivebay::storage::models::{
    FileRecord, FolderRecord, ResourceKind, ShareLinkRecord, ShareRole,
};
use drivebay::storage::Database;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn sample_file(id: &str, owner_id: &str, name: &str) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "image/png".to_string(),
        size: 1024,
        key: format!("{owner_id}/{id}.png"),
        bucket: "test".to_string(),
        owner_id: owner_id.to_string(),
        folder_id: None,
        checksum: "deadbeef".to_string(),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn sample_folder(id: &str, owner_id: &str, name: &str) -> FolderRecord {
    let now = Utc::now();
    FolderRecord {
        id: id.to_string(),
        name: name.to_string(),
        owner_id: owner_id.to_string(),
        parent_id: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_create_and_get_file() {
    let (_dir, db) = test_db();

    let file = sample_file("f1", "user-1", "photo.png");
    db.create_file(&file).unwrap();

    let fetched = db.get_file("f1").unwrap().unwrap();
    assert_eq!(fetched.name, "photo.png");
    assert_eq!(fetched.owner_id, "user-1");
    assert_eq!(fetched.key, file.key);
    assert!(!fetched.is_deleted());

    assert!(db.get_file("missing").unwrap().is_none());
}

#[test]
fn test_soft_delete_hides_file_from_listing() {
    let (_dir, db) = test_db();

    db.create_file(&sample_file("f1", "user-1", "keep.png")).unwrap();
    db.create_file(&sample_file("f2", "user-1", "trash.png")).unwrap();

    assert!(db.set_file_deleted("f2", Some(Utc::now())).unwrap());

    let live = db.list_files("user-1", None).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "f1");

    let trashed = db.list_trashed_files("user-1").unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id, "f2");
    assert!(trashed[0].deleted_at.is_some());
}

#[test]
fn test_restore_clears_deleted_at() {
    let (_dir, db) = test_db();

    db.create_file(&sample_file("f1", "user-1", "doc.png")).unwrap();
    db.set_file_deleted("f1", Some(Utc::now())).unwrap();
    assert!(db.list_files("user-1", None).unwrap().is_empty());

    assert!(db.set_file_deleted("f1", None).unwrap());

    let live = db.list_files("user-1", None).unwrap();
    assert_eq!(live.len(), 1);
    assert!(live[0].deleted_at.is_none());
}

#[test]
fn test_rename_file_keeps_key() {
    let (_dir, db) = test_db();

    let file = sample_file("f1", "user-1", "old.png");
    db.create_file(&file).unwrap();

    assert!(db.rename_file("f1", "new.png").unwrap());
    let fetched = db.get_file("f1").unwrap().unwrap();
    assert_eq!(fetched.name, "new.png");
    assert_eq!(fetched.key, file.key);
    assert!(fetched.updated_at >= file.updated_at);

    assert!(!db.rename_file("missing", "whatever").unwrap());
}

#[test]
fn test_remove_file_cleans_owner_index() {
    let (_dir, db) = test_db();

    db.create_file(&sample_file("f1", "user-1", "a.png")).unwrap();
    db.create_file(&sample_file("f2", "user-1", "b.png")).unwrap();

    assert!(db.remove_file("f1").unwrap());
    assert!(db.get_file("f1").unwrap().is_none());

    let remaining = db.files_by_owner("user-1").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "f2");

    assert!(!db.remove_file("f1").unwrap());
}

#[test]
fn test_list_files_scoped_to_folder_and_owner() {
    let (_dir, db) = test_db();

    let mut in_folder = sample_file("f1", "user-1", "inside.png");
    in_folder.folder_id = Some("d1".to_string());
    db.create_file(&in_folder).unwrap();
    db.create_file(&sample_file("f2", "user-1", "root.png")).unwrap();
    db.create_file(&sample_file("f3", "user-2", "other.png")).unwrap();

    let root = db.list_files("user-1", None).unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].id, "f2");

    let folder = db.list_files("user-1", Some("d1")).unwrap();
    assert_eq!(folder.len(), 1);
    assert_eq!(folder[0].id, "f1");
}

#[test]
fn test_search_files_case_insensitive() {
    let (_dir, db) = test_db();

    db.create_file(&sample_file("f1", "user-1", "Vacation Photo.png")).unwrap();
    db.create_file(&sample_file("f2", "user-1", "invoice.pdf")).unwrap();
    db.create_file(&sample_file("f3", "user-1", "hidden.png")).unwrap();
    db.set_file_deleted("f3", Some(Utc::now())).unwrap();

    let by_name = db.search_files("user-1", "vacation").unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, "f1");

    // MIME types match too; trashed files never do
    let by_mime = db.search_files("user-1", "PNG").unwrap();
    assert_eq!(by_mime.len(), 1);
    assert_eq!(by_mime[0].id, "f1");
}

#[test]
fn test_folder_hierarchy_listing() {
    let (_dir, db) = test_db();

    db.create_folder(&sample_folder("d1", "user-1", "Documents")).unwrap();
    let mut child = sample_folder("d2", "user-1", "Taxes");
    child.parent_id = Some("d1".to_string());
    db.create_folder(&child).unwrap();

    let top = db.list_folders("user-1", None).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].id, "d1");

    let children = db.list_folders("user-1", Some("d1")).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "d2");
}

#[test]
fn test_folder_soft_delete_and_trash_listing() {
    let (_dir, db) = test_db();

    db.create_folder(&sample_folder("d1", "user-1", "Old Stuff")).unwrap();
    assert!(db.set_folder_deleted("d1", Some(Utc::now())).unwrap());

    assert!(db.list_folders("user-1", None).unwrap().is_empty());

    let trashed = db.list_trashed_folders("user-1").unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id, "d1");

    assert!(db.remove_folder("d1").unwrap());
    assert!(db.get_folder("d1").unwrap().is_none());
}

#[test]
fn test_search_folders() {
    let (_dir, db) = test_db();

    db.create_folder(&sample_folder("d1", "user-1", "Tax Documents")).unwrap();
    db.create_folder(&sample_folder("d2", "user-1", "Photos")).unwrap();

    let hits = db.search_folders("user-1", "tax").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "d1");
}

#[test]
fn test_share_link_create_and_get() {
    let (_dir, db) = test_db();

    let now = Utc::now();
    let link = ShareLinkRecord {
        token: "abc123".to_string(),
        resource_id: "f1".to_string(),
        resource_kind: ResourceKind::File,
        role: ShareRole::Viewer,
        expires_at: now + Duration::minutes(60),
        created_at: now,
    };
    db.create_share_link(&link).unwrap();

    let fetched = db.get_share_link("abc123").unwrap().unwrap();
    assert_eq!(fetched.resource_id, "f1");
    assert_eq!(fetched.resource_kind, ResourceKind::File);
    assert_eq!(fetched.role, ShareRole::Viewer);

    assert!(db.get_share_link("nope").unwrap().is_none());
}

#[tokio::test]
async fn test_soft_delete_leaves_object_bytes_untouched() {
    use bytes::Bytes;
    use drivebay::object_store::{LocalStore, ObjectStore};

    let (dir, db) = test_db();
    let store = LocalStore::new(dir.path().join("files"), None).unwrap();

    let file = sample_file("f1", "user-1", "photo.png");
    store
        .put(&file.key, Bytes::from("png bytes"), "image/png")
        .await
        .unwrap();
    db.create_file(&file).unwrap();

    // Trash and restore only flip metadata; the object survives both
    db.set_file_deleted("f1", Some(Utc::now())).unwrap();
    assert!(store.head(&file.key).await.is_ok());

    db.set_file_deleted("f1", None).unwrap();
    assert!(store.head(&file.key).await.is_ok());
}

#[test]
fn test_share_link_lifecycle() {
    let (_dir, db) = test_db();

    let now = Utc::now();
    let link = ShareLinkRecord {
        token: "lifecycle".to_string(),
        resource_id: "f1".to_string(),
        resource_kind: ResourceKind::File,
        role: ShareRole::Viewer,
        expires_at: now + Duration::minutes(60),
        created_at: now,
    };
    db.create_share_link(&link).unwrap();

    // Valid while inside its lifetime
    let fetched = db.get_share_link("lifecycle").unwrap().unwrap();
    assert!(!fetched.is_expired(now + Duration::minutes(59)));

    // Once past expiry the record still exists but must be treated as
    // absent by resolution
    let later = now + Duration::minutes(61);
    assert!(fetched.is_expired(later));
    let resolved = db
        .get_share_link("lifecycle")
        .unwrap()
        .filter(|l| !l.is_expired(later));
    assert!(resolved.is_none());
}

#[test]
fn test_share_link_expiry_boundary() {
    let now = Utc::now();
    let link = ShareLinkRecord {
        token: "t".to_string(),
        resource_id: "f1".to_string(),
        resource_kind: ResourceKind::Folder,
        role: ShareRole::Viewer,
        expires_at: now,
        created_at: now - Duration::minutes(60),
    };

    // Valid strictly before the expiry instant, expired at and after it
    assert!(!link.is_expired(now - Duration::milliseconds(1)));
    assert!(link.is_expired(now));
    assert!(link.is_expired(now + Duration::milliseconds(1)));
}
