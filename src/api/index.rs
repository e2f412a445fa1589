use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::indexer;
use crate::models::IndexParams;
use crate::state::AppState;

/// POST /index?path= - Start a detached indexing run of a local directory.
///
/// Returns 202 as soon as the run is scheduled; progress is reported through
/// logs and `GET /stats`.
pub async fn start_index(
    State(state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> (StatusCode, Json<Value>) {
    let Some(path) = params.path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "Query parameter 'path' is required");
    };
    let root = PathBuf::from(&path);
    if !root.is_dir() {
        return error(StatusCode::BAD_REQUEST, &format!("{path} is not a directory"));
    }
    let Some(semantic) = state.backends.semantic.clone() else {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Semantic search is not available: vector store or embedding service is down",
        );
    };
    if !state.index_status.try_begin(&path) {
        return error(StatusCode::CONFLICT, "An indexing run is already in progress");
    }

    let status = state.index_status.clone();
    let use_treesitter = state.config.use_treesitter;
    tokio::spawn(async move {
        indexer::run(root, semantic, use_treesitter, &status).await;
    });

    tracing::info!("Scheduled indexing of {path}");
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": format!("Indexing of {path} started"),
            "path": path,
        })),
    )
}

/// GET /stats - Vector store size and the last indexing run.
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let Some(semantic) = &state.backends.semantic else {
        return Json(json!({
            "indexed": false,
            "totalChunks": 0,
            "error": "Semantic search is not available",
        }));
    };

    match semantic.store.count().await {
        Ok(total) => Json(json!({
            "indexed": total > 0,
            "totalChunks": total,
            "lastRun": state.index_status.last_run(),
        })),
        Err(e) => {
            tracing::warn!("Vector store count failed: {e:#}");
            Json(json!({
                "indexed": false,
                "totalChunks": 0,
                "error": format!("{e:#}"),
            }))
        }
    }
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "error": message })))
}
