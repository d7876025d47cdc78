use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::files::FileBody;
use crate::api::auth::Identity;
use crate::api::response::{ApiError, AppJson, AppQuery, PageParams, Paginated};
use crate::storage::models::FolderRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderBody {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub parent_id: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&FolderRecord> for FolderBody {
    fn from(folder: &FolderRecord) -> Self {
        FolderBody {
            id: folder.id.clone(),
            name: folder.name.clone(),
            owner_id: folder.owner_id.clone(),
            parent_id: folder.parent_id.clone(),
            deleted_at: folder.deleted_at.map(|t| t.to_rfc3339()),
            created_at: folder.created_at.to_rfc3339(),
            updated_at: folder.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FolderEnvelope {
    pub folder: FolderBody,
}

#[derive(Debug, Serialize)]
pub struct FolderChildren {
    pub folders: Vec<FolderBody>,
    pub files: Vec<FileBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppQuery(page): AppQuery<PageParams>,
) -> Result<Json<Paginated<Vec<FolderBody>>>, ApiError> {
    let folders = state
        .db
        .list_folders(&identity.user_id, None)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = folders.len() as u64;
    let (_, limit) = page.clamped();
    let results: Vec<FolderBody> = folders
        .iter()
        .skip(page.offset())
        .take(limit as usize)
        .map(FolderBody::from)
        .collect();

    Ok(Paginated::new(&page, total, results))
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppJson(req): AppJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderEnvelope>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    if let Some(ref parent_id) = req.parent_id {
        owned_live_folder(&state, &identity, parent_id)?;
    }

    let now = Utc::now();
    let folder = FolderRecord {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        owner_id: identity.user_id.clone(),
        parent_id: req.parent_id,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    state
        .db
        .create_folder(&folder)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(folder_id = %folder.id, "Created folder");

    Ok((
        StatusCode::CREATED,
        Json(FolderEnvelope {
            folder: FolderBody::from(&folder),
        }),
    ))
}

/// Immediate children of a folder: live subfolders and files.
pub async fn folder_children(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<FolderChildren>, ApiError> {
    owned_live_folder(&state, &identity, &id)?;

    let folders = state
        .db
        .list_folders(&identity.user_id, Some(&id))
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let files = state
        .db
        .list_files(&identity.user_id, Some(&id))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(FolderChildren {
        folders: folders.iter().map(FolderBody::from).collect(),
        files: files.iter().map(FileBody::from).collect(),
    }))
}

pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<RenameFolderRequest>,
) -> Result<Json<FolderEnvelope>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    owned_live_folder(&state, &identity, &id)?;

    state
        .db
        .rename_folder(&id, req.name.trim())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let folder = state
        .db
        .get_folder(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::internal("Folder not found after rename"))?;

    Ok(Json(FolderEnvelope {
        folder: FolderBody::from(&folder),
    }))
}

/// Soft delete. Files inside keep their folder reference and surface
/// again if the folder is restored.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_live_folder(&state, &identity, &id)?;

    state
        .db
        .set_folder_deleted(&id, Some(Utc::now()))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(folder_id = %id, "Trashed folder");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

pub(super) fn owned_live_folder(
    state: &AppState,
    identity: &Identity,
    id: &str,
) -> Result<FolderRecord, ApiError> {
    state
        .db
        .get_folder(id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && !f.is_deleted())
        .ok_or_else(|| ApiError::not_found("Folder not found"))
}
