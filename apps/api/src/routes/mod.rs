pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::generation::handlers as generation;
use crate::records::handlers as records;
use crate::search::handlers as search;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Records API
        .route(
            "/api/v1/records",
            post(records::handle_create).get(records::handle_list),
        )
        .route("/api/v1/records/batch", post(records::handle_create_batch))
        .route(
            "/api/v1/records/:id",
            put(records::handle_update).delete(records::handle_delete),
        )
        .route(
            "/api/v1/parse-external-text",
            post(records::handle_parse_external_text),
        )
        // Search API
        .route("/api/v1/search", post(search::handle_search))
        // Generation API
        .route("/api/v1/generate", post(generation::handle_generate))
        .with_state(state)
}
