use redb::TableDefinition;

/// File records: id -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Folder records: id -> FolderRecord (msgpack)
pub const FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("folders");

/// Share links: token -> ShareLinkRecord (msgpack)
pub const SHARE_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("share_links");

/// Owner index: owner_id -> msgpack Vec of file ids
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Owner index: owner_id -> msgpack Vec of folder ids
pub const OWNER_FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_folders");
