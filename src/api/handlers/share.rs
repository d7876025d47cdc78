use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::files::FileSummary;
use crate::api::auth::Identity;
use crate::api::response::{ApiError, AppJson};
use crate::storage::models::{ResourceKind, ShareLinkRecord, ShareRole};
use crate::AppState;

/// Share links must stay within [1 minute, 30 days].
pub const MAX_SHARE_EXPIRY_MINUTES: i64 = 43200;

/// Signed URLs handed out on share resolution use this short fixed
/// expiry, independent of the link's own lifetime.
const SHARE_URL_EXPIRY: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    #[serde(default = "default_role")]
    pub role: ShareRole,
    #[serde(default = "default_expiry_minutes")]
    pub expires_in_minutes: i64,
}

fn default_role() -> ShareRole {
    ShareRole::Viewer
}

fn default_expiry_minutes() -> i64 {
    60
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCreatedBody {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct SharedFileBody {
    pub file: FileSummary,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SharedFolderBody {
    pub folder: SharedFolderSummary,
}

#[derive(Debug, Serialize)]
pub struct SharedFolderSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ShareResolvedBody {
    File(SharedFileBody),
    Folder(SharedFolderBody),
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_share(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppJson(req): AppJson<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareCreatedBody>), ApiError> {
    if req.expires_in_minutes < 1 || req.expires_in_minutes > MAX_SHARE_EXPIRY_MINUTES {
        return Err(ApiError::validation(format!(
            "expiresInMinutes must be between 1 and {MAX_SHARE_EXPIRY_MINUTES}"
        )));
    }

    // The shared resource must exist, be live, and belong to the caller
    match req.resource_kind {
        ResourceKind::File => {
            let file = state
                .db
                .get_file(&req.resource_id)
                .map_err(|e| ApiError::internal(e.to_string()))?
                .filter(|f| !f.is_deleted())
                .ok_or_else(|| ApiError::not_found("File not found"))?;
            if file.owner_id != identity.user_id {
                return Err(ApiError::forbidden("File belongs to another user"));
            }
        }
        ResourceKind::Folder => {
            let folder = state
                .db
                .get_folder(&req.resource_id)
                .map_err(|e| ApiError::internal(e.to_string()))?
                .filter(|f| !f.is_deleted())
                .ok_or_else(|| ApiError::not_found("Folder not found"))?;
            if folder.owner_id != identity.user_id {
                return Err(ApiError::forbidden("Folder belongs to another user"));
            }
        }
    }

    let link = ShareLinkRecord {
        token: uuid::Uuid::new_v4().simple().to_string(),
        resource_id: req.resource_id,
        resource_kind: req.resource_kind,
        role: req.role,
        expires_at: Utc::now() + chrono::Duration::minutes(req.expires_in_minutes),
        created_at: Utc::now(),
    };

    state
        .db
        .create_share_link(&link)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(token = %link.token, resource_id = %link.resource_id, "Created share link");

    Ok((
        StatusCode::CREATED,
        Json(ShareCreatedBody {
            token: link.token,
            expires_at: link.expires_at.to_rfc3339(),
        }),
    ))
}

/// Resolve a share link without authentication. Absent and expired links
/// are indistinguishable: both 404, so token probing leaks nothing.
pub async fn resolve_share(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ShareResolvedBody>, ApiError> {
    let link = state
        .db
        .get_share_link(&token)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|l| !l.is_expired(Utc::now()))
        .ok_or_else(|| ApiError::not_found("Invalid link"))?;

    match link.resource_kind {
        ResourceKind::File => {
            let file = state
                .db
                .get_file(&link.resource_id)
                .map_err(|e| ApiError::internal(e.to_string()))?
                .filter(|f| !f.is_deleted())
                .ok_or_else(|| ApiError::not_found("Not found"))?;

            let url = state
                .object_store
                .signed_url(&file.key, &file.mime_type, SHARE_URL_EXPIRY)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;

            Ok(Json(ShareResolvedBody::File(SharedFileBody {
                file: FileSummary::from(&file),
                url,
            })))
        }
        ResourceKind::Folder => {
            let folder = state
                .db
                .get_folder(&link.resource_id)
                .map_err(|e| ApiError::internal(e.to_string()))?
                .filter(|f| !f.is_deleted())
                .ok_or_else(|| ApiError::not_found("Not found"))?;

            // Folder shares are metadata-only: no listing, no nested URLs
            Ok(Json(ShareResolvedBody::Folder(SharedFolderBody {
                folder: SharedFolderSummary {
                    id: folder.id,
                    name: folder.name,
                },
            })))
        }
    }
}
