use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::files::FileBody;
use super::folders::FolderBody;
use crate::api::auth::Identity;
use crate::api::response::{ApiError, AppQuery, PageParams, Paginated};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub files: Vec<FileBody>,
    pub folders: Vec<FolderBody>,
}

/// Case-insensitive substring search over live file names/MIME types and
/// folder names. An empty query returns an empty result rather than
/// everything.
pub async fn search(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<Paginated<SearchResults>>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Paginated::new(
            &page,
            0,
            SearchResults {
                files: Vec::new(),
                folders: Vec::new(),
            },
        ));
    }

    let files = state
        .db
        .search_files(&identity.user_id, query)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let folders = state
        .db
        .search_folders(&identity.user_id, query)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = (files.len() + folders.len()) as u64;
    let (_, limit) = page.clamped();
    let results = SearchResults {
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
