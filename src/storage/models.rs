use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file's metadata row. References exactly one stored object by
/// `key` + `bucket`; the key is assigned at upload and never mutated
/// (renames change only `name`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Display name (original upload filename until renamed)
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub key: String,
    pub bucket: String,
    pub owner_id: String,
    /// None = lives at the owner's root
    pub folder_id: Option<String>,
    /// SHA-256 of the content, hex-encoded. Integrity only, not dedup.
    pub checksum: String,
    /// Set = soft-deleted (in trash)
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// None = top-level folder
    pub parent_id: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FolderRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// What a share link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    File,
    Folder,
}

/// Role granted by a share link. Editor is stored but operationally
/// unused beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShareRole {
    Viewer,
    Editor,
}

/// An opaque, expiring share link. Immutable once created; expiry is the
/// only termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLinkRecord {
    pub token: String,
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub role: ShareRole,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ShareLinkRecord {
    /// A link is valid iff `now < expires_at`; at the boundary instant it
    /// is already expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
