//! Axum handlers.

pub mod ask;
pub mod index;
pub mod search;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All routes over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search::search))
        .route("/ask", get(ask::ask))
        .route("/index", post(index::start_index))
        .route("/stats", get(index::stats))
        .with_state(state)
}
