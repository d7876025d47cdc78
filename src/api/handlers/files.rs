use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::Identity;
use crate::api::response::{ApiError, AppJson, AppQuery, PageParams, Paginated};
use crate::object_store::{object_key, ObjectStoreError, ObjectStream};
use crate::retrieval::{resolve_download, resolve_preview, Resolved};
use crate::storage::models::FileRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBody {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// String-encoded so 64-bit sizes survive JSON consumers
    pub size: String,
    pub key: String,
    pub bucket: String,
    pub owner_id: String,
    pub folder_id: Option<String>,
    pub checksum: String,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&FileRecord> for FileBody {
    fn from(file: &FileRecord) -> Self {
        FileBody {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size.to_string(),
            key: file.key.clone(),
            bucket: file.bucket.clone(),
            owner_id: file.owner_id.clone(),
            folder_id: file.folder_id.clone(),
            checksum: file.checksum.clone(),
            deleted_at: file.deleted_at.map(|t| t.to_rfc3339()),
            created_at: file.created_at.to_rfc3339(),
            updated_at: file.updated_at.to_rfc3339(),
        }
    }
}

/// Slim shape used by download and share responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: String,
}

impl From<&FileRecord> for FileSummary {
    fn from(file: &FileRecord) -> Self {
        FileSummary {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileEnvelope {
    pub file: FileBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBody {
    pub download_url: String,
    pub file: FileSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewBody {
    pub preview_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// The parts of a multipart upload request the handler acts on.
#[derive(Debug)]
struct UploadParts {
    data: bytes::Bytes,
    file_name: String,
    content_type: Option<String>,
    folder_id: Option<String>,
}

/// Read the upload form: a `file` part plus an optional `folderId` text
/// part (the snake_case spelling is accepted for older clients). Unknown
/// parts are ignored.
async fn read_upload(
    multipart: &mut Multipart,
    max_upload_size: u64,
) -> Result<UploadParts, ApiError> {
    let mut file_data: Option<bytes::Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut folder_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {max_upload_size} bytes"
                    )));
                }

                file_data = Some(data);
            }
            "folderId" | "folder_id" => {
                folder_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(format!("Invalid folderId: {e}")))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = file_data.ok_or_else(|| ApiError::validation("file field is required"))?;
    let file_name = file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "unnamed".to_string());

    Ok(UploadParts {
        data,
        file_name,
        content_type,
        folder_id,
    })
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileEnvelope>), ApiError> {
    let UploadParts {
        data: file_data,
        file_name,
        content_type: file_content_type,
        folder_id,
    } = read_upload(&mut multipart, state.config.max_upload_size).await?;

    // A referenced folder must exist, be live, and belong to the caller
    if let Some(ref folder_id) = folder_id {
        let folder = state
            .db
            .get_folder(folder_id)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .filter(|f| !f.is_deleted())
            .ok_or_else(|| ApiError::not_found("Folder not found"))?;
        if folder.owner_id != identity.user_id {
            return Err(ApiError::forbidden("Folder belongs to another user"));
        }
    }

    // MIME type: from the multipart part, or guessed from the filename
    let mime_type = file_content_type
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(&file_name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let size = file_data.len() as u64;
    let key = object_key(&identity.user_id, &file_name);
    let checksum = sha256_hex(&file_data);
    let now = Utc::now();

    // Phase 1: write the object. The key is fresh, so no collision.
    state
        .object_store
        .put(&key, file_data, &mime_type)
        .await
        .map_err(|e| ApiError::storage_write(format!("Failed to store file: {e}")))?;

    // Phase 2: create the metadata row. If this fails the object is
    // orphaned; cleanup is best-effort only.
    let file = FileRecord {
        id: uuid::Uuid::new_v4().to_string(),
        name: file_name,
        mime_type,
        size,
        key: key.clone(),
        bucket: state.config.storage.bucket_label(),
        owner_id: identity.user_id.clone(),
        folder_id,
        checksum,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.db.create_file(&file) {
        if let Err(cleanup_err) = state.object_store.delete(&key).await {
            tracing::warn!(key, error = %cleanup_err, "Failed to clean up orphaned object");
        }
        return Err(ApiError::internal(e.to_string()));
    }

    tracing::debug!(file_id = %file.id, key = %key, "Uploaded file");

    Ok((
        StatusCode::CREATED,
        Json(FileEnvelope {
            file: FileBody::from(&file),
        }),
    ))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<Paginated<Vec<FileBody>>>, ApiError> {
    let files = state
        .db
        .list_files(&identity.user_id, params.folder_id.as_deref())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = files.len() as u64;
    let (_, limit) = page.clamped();
    let results: Vec<FileBody> = files
        .iter()
        .skip(page.offset())
        .take(limit as usize)
        .map(FileBody::from)
        .collect();

    Ok(Paginated::new(&page, total, results))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<FileEnvelope>, ApiError> {
    let file = owned_live_file(&state, &identity, &id)?;
    Ok(Json(FileEnvelope {
        file: FileBody::from(&file),
    }))
}

/// Download resolution: signed URL preferred, proxied stream as the
/// fallback. Tier-1 failure is never surfaced to the client.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = owned_live_file(&state, &identity, &id)?;
    let expiry = Duration::from_secs(state.config.storage.signed_url_expiry_secs);

    match resolve_download(state.object_store.as_ref(), &file, expiry).await {
        Ok(Resolved::Url(url)) => Ok(Json(DownloadBody {
            download_url: url,
            file: FileSummary::from(&file),
        })
        .into_response()),
        Ok(Resolved::Stream(object)) => Ok(stream_response(object, &file.name)),
        Ok(Resolved::DataUrl(_)) => Err(ApiError::internal(
            "Inline resolution is not valid for download",
        )),
        Err(e) => Err(ApiError::download_failed(e.to_string())),
    }
}

/// Always the proxied byte stream, bypassing the signed-URL tier.
pub async fn stream_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = owned_live_file(&state, &identity, &id)?;

    let object = state
        .object_store
        .get_stream(&file.key)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) => ApiError::not_found("File content not found"),
            _ => ApiError::download_failed(format!("Failed to retrieve file: {e}")),
        })?;

    Ok(stream_response(object, &file.name))
}

/// Preview resolution: small images inline as data URLs, everything else
/// resolves to a signed or proxy URL.
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<PreviewBody>, ApiError> {
    let file = owned_live_file(&state, &identity, &id)?;
    let expiry = Duration::from_secs(state.config.storage.signed_url_expiry_secs);

    match resolve_preview(state.object_store.as_ref(), &file, expiry).await {
        Ok(Resolved::Url(url)) | Ok(Resolved::DataUrl(url)) => {
            Ok(Json(PreviewBody { preview_url: url }))
        }
        // The proxy tier verified the object is streamable; point the
        // client at our own stream route.
        Ok(Resolved::Stream(_)) => Ok(Json(PreviewBody {
            preview_url: format!("/files/{id}/stream"),
        })),
        Err(e) => Err(ApiError::preview_unavailable(e.to_string())),
    }
}

pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
    AppJson(req): AppJson<RenameRequest>,
) -> Result<Json<FileEnvelope>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    owned_live_file(&state, &identity, &id)?;

    state
        .db
        .rename_file(&id, req.name.trim())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let file = state
        .db
        .get_file(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::internal("File not found after rename"))?;

    Ok(Json(FileEnvelope {
        file: FileBody::from(&file),
    }))
}

/// Soft delete: sets the trash timestamp, never touches the object bytes.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_live_file(&state, &identity, &id)?;

    state
        .db
        .set_file_deleted(&id, Some(Utc::now()))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(file_id = %id, "Trashed file");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

/// Load a live file, checking ownership. Files owned by other users are
/// reported as not-found rather than forbidden to avoid existence leaks.
pub(super) fn owned_live_file(
    state: &AppState,
    identity: &Identity,
    id: &str,
) -> Result<FileRecord, ApiError> {
    state
        .db
        .get_file(id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|f| f.owner_id == identity.user_id && !f.is_deleted())
        .ok_or_else(|| ApiError::not_found("File not found"))
}

pub(super) fn stream_response(object: ObjectStream, file_name: &str) -> Response {
    let mut response = axum::body::Body::from_stream(object.stream).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        object
            .content_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    if let Some(len) = object.content_length {
        headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));
    }

    let sanitized = file_name.replace(['"', '\\'], "_");
    if let Ok(value) = format!("attachment; filename=\"{sanitized}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

fn sha256_hex(data: &[u8]) -> String {
    ring::digest::digest(&ring::digest::SHA256, data)
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequest;

    const BOUNDARY: &str = "test-boundary";

    async fn multipart_from(parts: &[(&str, Option<&str>, &str, &str)]) -> Multipart {
        let mut body = String::new();
        for (name, filename, content_type, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n"
                )),
            }
            if !content_type.is_empty() {
                body.push_str(&format!("Content-Type: {content_type}\r\n"));
            }
            body.push_str(&format!("\r\n{content}\r\n"));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let request = axum::http::Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(axum::body::Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn upload_captures_folder_id_field() {
        let mut multipart = multipart_from(&[
            ("folderId", None, "", "d1"),
            ("file", Some("a.txt"), "text/plain", "hello"),
        ])
        .await;

        let parts = read_upload(&mut multipart, 1024).await.unwrap();
        assert_eq!(parts.folder_id.as_deref(), Some("d1"));
        assert_eq!(parts.file_name, "a.txt");
        assert_eq!(parts.content_type.as_deref(), Some("text/plain"));
        assert_eq!(parts.data.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn upload_accepts_snake_case_folder_field() {
        let mut multipart = multipart_from(&[
            ("file", Some("a.txt"), "text/plain", "hello"),
            ("folder_id", None, "", "d2"),
        ])
        .await;

        let parts = read_upload(&mut multipart, 1024).await.unwrap();
        assert_eq!(parts.folder_id.as_deref(), Some("d2"));
    }

    #[tokio::test]
    async fn upload_ignores_unknown_fields() {
        let mut multipart = multipart_from(&[
            ("comment", None, "", "ignored"),
            ("file", Some("a.txt"), "text/plain", "hello"),
        ])
        .await;

        let parts = read_upload(&mut multipart, 1024).await.unwrap();
        assert!(parts.folder_id.is_none());
        assert_eq!(parts.data.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn upload_rejects_oversized_file_as_payload_too_large() {
        let content = "x".repeat(32);
        let mut multipart =
            multipart_from(&[("file", Some("big.bin"), "application/octet-stream", content.as_str())])
                .await;

        let err = read_upload(&mut multipart, 16).await.unwrap_err();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code, "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn upload_requires_file_field() {
        let mut multipart = multipart_from(&[("folderId", None, "", "d1")]).await;

        let err = read_upload(&mut multipart, 1024).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
