use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::files::FileBody;
use super::folders::{FolderBody, FolderEnvelope};
use crate::api::auth::Identity;
use crate::api::response::{ApiError, AppQuery, PageParams, Paginated};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TrashResults {
    pub files: Vec<FileBody>,
    pub folders: Vec<FolderBody>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RestoredEnvelope {
    File(super::files::FileEnvelope),
    Folder(FolderEnvelope),
}

pub async fn list_trash(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppQuery(page): AppQuery<PageParams>,
) -> Result<Json<Paginated<TrashResults>>, ApiError> {
    let files = state
        .db
        .list_trashed_files(&identity.user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let folders = state
        .db
        .list_trashed_folders(&identity.user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = (files.len() + folders.len()) as u64;
    let (_, limit) = page.clamped();
    let results = TrashResults {
        files: files
            .iter()
            .skip(page.offset())
            .take(limit as usize)
            .map(FileBody::from)
            .collect(),
        folders: folders
            .iter()
            .skip(page.offset())
            .take(limit as usize)
            .map(FolderBody::from)
            .collect(),
    };

    Ok(Paginated::new(&page, total, results))
}

/// Clear the soft-delete timestamp on a trashed file or folder. The
/// object bytes were never touched, so restore is metadata-only.
pub async fn restore(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<RestoredEnvelope>, ApiError> {
    if let Some(file) = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && f.is_deleted())
    {
        state
            .db
            .set_file_deleted(&file.id, None)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let file = state
            .db
            .get_file(&id)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .ok_or_else(|| ApiError::internal("File not found after restore"))?;
        tracing::debug!(file_id = %id, "Restored file");
        return Ok(Json(RestoredEnvelope::File(super::files::FileEnvelope {
            file: FileBody::from(&file),
        })));
    }

    if let Some(folder) = state
        .db
        .get_folder(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && f.is_deleted())
    {
        state
            .db
            .set_folder_deleted(&folder.id, None)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let folder = state
            .db
            .get_folder(&id)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .ok_or_else(|| ApiError::internal("Folder not found after restore"))?;
        tracing::debug!(folder_id = %id, "Restored folder");
        return Ok(Json(RestoredEnvelope::Folder(FolderEnvelope {
            folder: FolderBody::from(&folder),
        })));
    }

    Err(ApiError::not_found("Not found"))
}

/// Hard delete from trash: object-store delete first, then the metadata
/// row. A missing object is tolerated so metadata cleanup always wins
/// over storage-space reclamation.
pub async fn purge(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Some(file) = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && f.is_deleted())
    {
        if let Err(e) = state.object_store.delete(&file.key).await {
            tracing::warn!(key = %file.key, error = %e, "Failed to delete object during purge");
        }
        state
            .db
            .remove_file(&file.id)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        tracing::debug!(file_id = %id, "Purged file");
        return Ok(StatusCode::NO_CONTENT);
    }

    if let Some(folder) = state
        .db
        .get_folder(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && f.is_deleted())
    {
        state
            .db
            .remove_folder(&folder.id)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        tracing::debug!(folder_id = %id, "Purged folder");
        return Ok(StatusCode::NO_CONTENT);
    }

    Err(ApiError::not_found("Not found"))
}
