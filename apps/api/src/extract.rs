//! Request extractors that reject through `AppError`, so malformed bodies get the
//! same `{"error": {"code", "message"}}` shape as every other failure.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::errors::AppError;

/// `axum::Json` with its rejection mapped to `AppError::Validation`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
