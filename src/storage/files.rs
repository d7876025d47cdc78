use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a new file record and add it to the owner index
    pub fn create_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(!file.key.is_empty(), "file key must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            let mut owner_table = write_txn.open_table(OWNER_FILES)?;
            let mut file_ids: Vec<String> = owner_table
                .get(file.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its id
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Set or clear a file's soft-delete timestamp. The object bytes are
    /// never touched; only the metadata row changes.
    pub fn set_file_deleted(
        &self,
        id: &str,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        self.mutate_file(id, |file| {
            file.deleted_at = deleted_at;
        })
    }

    /// Change a file's display name. The storage key is never renamed.
    pub fn rename_file(&self, id: &str, name: &str) -> Result<bool, DatabaseError> {
        self.mutate_file(id, |file| {
            file.name = name.to_string();
        })
    }

    fn mutate_file<F>(&self, id: &str, mutate: F) -> Result<bool, DatabaseError>
    where
        F: FnOnce(&mut FileRecord),
    {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(FILES)?;
            let existing = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice::<FileRecord>(data.value())?),
                None => None,
            };
            existing
        };

        let updated = match existing {
            Some(mut file) => {
                mutate(&mut file);
                file.updated_at = Utc::now();

                let serialized = rmp_serde::to_vec_named(&file)?;
                let mut table = write_txn.open_table(FILES)?;
                table.insert(id, serialized.as_slice())?;
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Hard-delete a file row and clean up the owner index. The caller is
    /// responsible for deleting the underlying object first.
    pub fn remove_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owner_id: Option<String> = {
            let table = write_txn.open_table(FILES)?;
            let owner_id = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file.owner_id)
                }
                None => None,
            };
            owner_id
        };

        let deleted = match owner_id {
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(id)?;
                }

                let file_ids: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(OWNER_FILES)?;
                    let file_ids = match owner_table.get(owner_id.as_str())? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    file_ids
                };

                if let Some(mut ids) = file_ids {
                    ids.retain(|fid| fid != id);
                    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
                    if ids.is_empty() {
                        owner_table.remove(owner_id.as_str())?;
                    } else {
                        let data = rmp_serde::to_vec_named(&ids)?;
                        owner_table.insert(owner_id.as_str(), data.as_slice())?;
                    }
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// All of an owner's file records, live and trashed
    pub fn files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// An owner's live files in one folder (`None` = root), newest first
    pub fn list_files(
        &self,
        owner_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut files: Vec<FileRecord> = self
            .files_by_owner(owner_id)?
            .into_iter()
            .filter(|f| !f.is_deleted() && f.folder_id.as_deref() == folder_id)
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    /// An owner's soft-deleted files, most recently trashed first
    pub fn list_trashed_files(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut files: Vec<FileRecord> = self
            .files_by_owner(owner_id)?
            .into_iter()
            .filter(|f| f.is_deleted())
            .collect();
        files.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(files)
    }

    /// Case-insensitive substring search over an owner's live file names
    /// and MIME types, most recently updated first
    pub fn search_files(&self, owner_id: &str, query: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let needle = query.to_lowercase();
        let mut files: Vec<FileRecord> = self
            .files_by_owner(owner_id)?
            .into_iter()
            .filter(|f| {
                !f.is_deleted()
                    && (f.name.to_lowercase().contains(&needle)
                        || f.mime_type.to_lowercase().contains(&needle))
            })
            .collect();
        files.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(files)
    }
}
