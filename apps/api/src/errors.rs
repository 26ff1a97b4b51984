use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::embedding::EmbeddingError;
use crate::llm_client::GenerationError;
use crate::records::store::StoreError;

/// Longest backend message we are willing to echo back to a caller.
const MAX_UPSTREAM_MESSAGE_CHARS: usize = 200;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[source] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code, shared by HTTP bodies and per-record failure reports.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::UpstreamRateLimited(_) => "UPSTREAM_RATE_LIMITED",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } | AppError::UpstreamRateLimited(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamUnavailable(_)
            | AppError::Upstream(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to callers. Internal details are logged, never returned.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Unauthenticated(msg) => msg.clone(),
            AppError::RateLimited { .. } => "Too many requests, try again later".to_string(),
            AppError::UpstreamRateLimited(_) => {
                "The AI service is rate limiting requests, try again later".to_string()
            }
            AppError::UpstreamUnavailable(_) => {
                "An AI service is unavailable or misconfigured".to_string()
            }
            AppError::UpstreamTimeout(_) => "The AI service timed out, try again".to_string(),
            AppError::Upstream(msg) => truncate_chars(msg, MAX_UPSTREAM_MESSAGE_CHARS),
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::UpstreamUnavailable(msg) => tracing::error!("Upstream unavailable: {msg}"),
            AppError::Upstream(msg) => tracing::error!("Upstream error: {msg}"),
            AppError::Database(e) => tracing::error!("Database error: {e}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e:?}"),
            AppError::UpstreamTimeout(msg) => tracing::warn!("Upstream timeout: {msg}"),
            AppError::UpstreamRateLimited(msg) => tracing::warn!("Upstream rate limited: {msg}"),
            _ => {}
        }

        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.public_message()
            }
        }));

        let mut response = (status, body).into_response();
        if let AppError::RateLimited {
            retry_after_secs: Some(secs),
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Timeout(_) => AppError::UpstreamTimeout(err.to_string()),
            EmbeddingError::RateLimited => AppError::UpstreamRateLimited(err.to_string()),
            _ => AppError::UpstreamUnavailable(err.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable(_) => AppError::UpstreamUnavailable(err.to_string()),
            GenerationError::Timeout(_) => AppError::UpstreamTimeout(err.to_string()),
            GenerationError::RateLimited => AppError::UpstreamRateLimited(err.to_string()),
            GenerationError::Backend { message, .. } => {
                AppError::Upstream(format!("Generation backend error: {message}"))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(id) => {
                AppError::Validation(format!("A record with id '{id}' already exists"))
            }
            other => AppError::Database(other),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Misconfigured(msg) => {
                AppError::Internal(anyhow::anyhow!("identity verification misconfigured: {msg}"))
            }
            AuthError::Expired => AppError::Unauthenticated("Token has expired".to_string()),
            AuthError::MissingCredential => {
                AppError::Unauthenticated("Authentication required".to_string())
            }
            _ => AppError::Unauthenticated("Invalid token".to_string()),
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push('…');
        out
    }
}
