//! Axum route handlers for the Records API.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    Json,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::rate_limit::Bucket;
use crate::records::external::{parse_external_text, ExternalTextRequest};
use crate::records::ingest::{create_batch, create_record, delete_record, update_record};
use crate::records::models::{Record, RecordDraft, RecordInput};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RecordStatusResponse {
    pub status: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub status: &'static str,
    pub count: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub records: Vec<Record>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DraftsResponse {
    pub drafts: Vec<RecordDraft>,
    pub count: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/records
pub async fn handle_create(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    ApiJson(input): ApiJson<RecordInput>,
) -> Result<Json<RecordStatusResponse>, AppError> {
    state.rate_limits.check(Bucket::Write, addr.ip())?;
    let record = create_record(
        state.embedder.as_ref(),
        state.store.as_ref(),
        &user.owner_id,
        input,
    )
    .await?;

    Ok(Json(RecordStatusResponse {
        status: "success",
        id: record.id,
    }))
}

/// POST /api/v1/records/batch
///
/// All records are created or none are.
pub async fn handle_create_batch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    ApiJson(inputs): ApiJson<Vec<RecordInput>>,
) -> Result<Json<BatchResponse>, AppError> {
    state.rate_limits.check(Bucket::Batch, addr.ip())?;
    let records = create_batch(
        state.embedder.as_ref(),
        state.store.as_ref(),
        &user.owner_id,
        inputs,
    )
    .await?;

    let ids: Vec<String> = records.into_iter().map(|r| r.id).collect();
    Ok(Json(BatchResponse {
        status: "success",
        count: ids.len(),
        ids,
    }))
}

/// GET /api/v1/records
///
/// Newest first. Embeddings are never returned.
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RecordListResponse>, AppError> {
    let records = state.store.list(&user.owner_id).await?;
    Ok(Json(RecordListResponse {
        count: records.len(),
        records,
    }))
}

/// PUT /api/v1/records/:id
pub async fn handle_update(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<RecordInput>,
) -> Result<Json<RecordStatusResponse>, AppError> {
    state.rate_limits.check(Bucket::Write, addr.ip())?;
    let record = update_record(
        state.embedder.as_ref(),
        state.store.as_ref(),
        &user.owner_id,
        &id,
        input,
    )
    .await?;

    Ok(Json(RecordStatusResponse {
        status: "updated",
        id: record.id,
    }))
}

/// DELETE /api/v1/records/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecordStatusResponse>, AppError> {
    state.rate_limits.check(Bucket::Write, addr.ip())?;
    delete_record(state.store.as_ref(), &user.owner_id, &id).await?;
    Ok(Json(RecordStatusResponse {
        status: "deleted",
        id: id.trim().to_string(),
    }))
}

/// POST /api/v1/parse-external-text
///
/// Proposes draft records from pasted profile text. Nothing is stored.
pub async fn handle_parse_external_text(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    _user: AuthUser,
    ApiJson(request): ApiJson<ExternalTextRequest>,
) -> Result<Json<DraftsResponse>, AppError> {
    state.rate_limits.check(Bucket::ExternalParse, addr.ip())?;
    let drafts = parse_external_text(
        state.generator.as_ref(),
        &request,
        state.config.generation_timeout,
    )
    .await?;

    Ok(Json(DraftsResponse {
        count: drafts.len(),
        drafts,
    }))
}
