use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FolderRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Folder operations
    // ========================================================================

    /// Store a new folder record and add it to the owner index
    pub fn create_folder(&self, folder: &FolderRecord) -> Result<(), DatabaseError> {
        debug_assert!(!folder.id.is_empty(), "folder id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FOLDERS)?;
            let data = rmp_serde::to_vec_named(folder)?;
            table.insert(folder.id.as_str(), data.as_slice())?;

            let mut owner_table = write_txn.open_table(OWNER_FOLDERS)?;
            let mut folder_ids: Vec<String> = owner_table
                .get(folder.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !folder_ids.contains(&folder.id) {
                folder_ids.push(folder.id.clone());
                let index_data = rmp_serde::to_vec_named(&folder_ids)?;
                owner_table.insert(folder.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a folder by its id
    pub fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;

        match table.get(id)? {
            Some(data) => {
                let folder: FolderRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(folder))
            }
            None => Ok(None),
        }
    }

    /// Set or clear a folder's soft-delete timestamp
    pub fn set_folder_deleted(
        &self,
        id: &str,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        self.mutate_folder(id, |folder| {
            folder.deleted_at = deleted_at;
        })
    }

    /// Change a folder's display name
    pub fn rename_folder(&self, id: &str, name: &str) -> Result<bool, DatabaseError> {
        self.mutate_folder(id, |folder| {
            folder.name = name.to_string();
        })
    }

    fn mutate_folder<F>(&self, id: &str, mutate: F) -> Result<bool, DatabaseError>
    where
        F: FnOnce(&mut FolderRecord),
    {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(FOLDERS)?;
            let existing = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice::<FolderRecord>(data.value())?),
                None => None,
            };
            existing
        };

        let updated = match existing {
            Some(mut folder) => {
                mutate(&mut folder);
                folder.updated_at = Utc::now();

                let serialized = rmp_serde::to_vec_named(&folder)?;
                let mut table = write_txn.open_table(FOLDERS)?;
                table.insert(id, serialized.as_slice())?;
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Hard-delete a folder row and clean up the owner index
    pub fn remove_folder(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owner_id: Option<String> = {
            let table = write_txn.open_table(FOLDERS)?;
            let owner_id = match table.get(id)? {
                Some(data) => {
                    let folder: FolderRecord = rmp_serde::from_slice(data.value())?;
                    Some(folder.owner_id)
                }
                None => None,
            };
            owner_id
        };

        let deleted = match owner_id {
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(FOLDERS)?;
                    table.remove(id)?;
                }

                let folder_ids: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(OWNER_FOLDERS)?;
                    let folder_ids = match owner_table.get(owner_id.as_str())? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    folder_ids
                };

                if let Some(mut ids) = folder_ids {
                    ids.retain(|fid| fid != id);
                    let mut owner_table = write_txn.open_table(OWNER_FOLDERS)?;
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

    /// All of an owner's folder records, live and trashed
    pub fn folders_by_owner(&self, owner_id: &str) -> Result<Vec<FolderRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FOLDERS)?;
        let folders_table = read_txn.open_table(FOLDERS)?;

        let folder_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut folders = Vec::new();
        for folder_id in folder_ids {
            if let Some(data) = folders_table.get(folder_id.as_str())? {
                let folder: FolderRecord = rmp_serde::from_slice(data.value())?;
                folders.push(folder);
            }
        }

        Ok(folders)
    }

    /// An owner's live folders under one parent (`None` = top level),
    /// newest first
    pub fn list_folders(
        &self,
        owner_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<FolderRecord>, DatabaseError> {
        let mut folders: Vec<FolderRecord> = self
            .folders_by_owner(owner_id)?
            .into_iter()
            .filter(|f| !f.is_deleted() && f.parent_id.as_deref() == parent_id)
            .collect();
        folders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(folders)
    }

    /// An owner's soft-deleted folders, most recently trashed first
    pub fn list_trashed_folders(&self, owner_id: &str) -> Result<Vec<FolderRecord>, DatabaseError> {
        let mut folders: Vec<FolderRecord> = self
            .folders_by_owner(owner_id)?
            .into_iter()
            .filter(|f| f.is_deleted())
            .collect();
        folders.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(folders)
    }

    /// Case-insensitive substring search over an owner's live folder
    /// names, most recently updated first
    pub fn search_folders(
        &self,
        owner_id: &str,
        query: &str,
    ) -> Result<Vec<FolderRecord>, DatabaseError> {
        let needle = query.to_lowercase();
        let mut folders: Vec<FolderRecord> = self
            .folders_by_owner(owner_id)?
            .into_iter()
            .filter(|f| !f.is_deleted() && f.name.to_lowercase().contains(&needle))
            .collect();
        folders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(folders)
    }
}
