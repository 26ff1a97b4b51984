//! Axum route handlers for the Generation API.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    Json,
};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::generation::pipeline::{GenerateRequest, GenerationOutcome};
use crate::rate_limit::Bucket;
use crate::state::AppState;

/// POST /api/v1/generate
///
/// Generates tailored bullets for the caller's selected records, or for the
/// records most relevant to the job description when none are selected.
pub async fn handle_generate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Result<Json<GenerationOutcome>, AppError> {
    state.rate_limits.check(Bucket::Generate, addr.ip())?;
    let outcome = state.pipeline.run(&user.owner_id, &request).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use crate::generation::pipeline::{GenerateRequest, DEFAULT_BULLETS};

    #[test]
    fn test_request_defaults() {
        let req: GenerateRequest =
            serde_json::from_str(r#"{"job_description":"Backend engineer, Rust"}"#).unwrap();
        assert_eq!(req.num_bullets, DEFAULT_BULLETS);
        assert!(req.record_ids.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_accepts_experience_ids_alias() {
        let req: GenerateRequest = serde_json::from_str(
            r#"{"job_description":"Backend engineer, Rust","num_bullets":5,"experience_ids":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(req.record_ids, vec!["a", "b"]);
        assert_eq!(req.num_bullets, 5);
    }
}
