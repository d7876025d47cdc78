use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Multipart boundaries and part headers count against the raw body
    // limit, so give it headroom beyond the file-size cap; the handler
    // enforces the exact cap on the file bytes and answers 413.
    let upload_limit = state.config.max_upload_size as usize + 64 * 1024;

    Router::new()
        // Files
        .route("/files", get(handlers::list_files))
        .route(
            "/files/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/:id", get(handlers::get_file))
        .route("/files/:id", delete(handlers::delete_file))
        .route("/files/:id/download", get(handlers::download_file))
        .route("/files/:id/stream", get(handlers::stream_file))
        .route("/files/:id/preview", get(handlers::preview_file))
        .route("/files/:id/rename", post(handlers::rename_file))
        // Folders
        .route("/folders", get(handlers::list_folders))
        .route("/folders", post(handlers::create_folder))
        .route("/folders/:id/children", get(handlers::folder_children))
        .route("/folders/:id/rename", post(handlers::rename_folder))
        .route("/folders/:id", delete(handlers::delete_folder))
        // Trash
        .route("/trash", get(handlers::list_trash))
        .route("/trash/restore/:id", post(handlers::restore))
        .route("/trash/:id", delete(handlers::purge))
        // Search
        .route("/search", get(handlers::search))
        // Share links (resolution is unauthenticated)
        .route("/share", post(handlers::create_share))
        .route("/share/:token", get(handlers::resolve_share))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
