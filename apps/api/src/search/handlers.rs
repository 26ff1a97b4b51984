use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::rate_limit::Bucket;
use crate::records::validation::check_text;
use crate::search::{search_text, ScoredRecord};
use crate::state::AppState;

const MAX_QUERY_CHARS: usize = 5000;
const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchRequest {
    fn validate(&self, max_results: usize) -> Result<(), AppError> {
        check_text("query", &self.query, 1, MAX_QUERY_CHARS)?;
        if self.limit == 0 || self.limit > max_results {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {max_results}"
            )));
        }
        Ok(())
    }
}

/// POST /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    state.rate_limits.check(Bucket::Search, addr.ip())?;
    let limits = state.config.search_limits();
    request.validate(limits.max_results)?;

    let results = search_text(
        state.embedder.as_ref(),
        state.store.as_ref(),
        &user.owner_id,
        request.query.trim(),
        request.limit,
        limits,
    )
    .await?;

    let message = results.is_empty().then(|| {
        "No records found matching your query. Try broader search terms.".to_string()
    });
    Ok(Json(SearchResponse { results, message }))
}
