use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::SharedVerifier;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::generation::pipeline::BulletPipeline;
use crate::llm_client::TextGenerator;
use crate::rate_limit::RateLimits;
use crate::records::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every service sits behind a trait object so tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn TextGenerator>,
    pub store: Arc<dyn RecordStore>,
    pub verifier: SharedVerifier,
    /// Built from the same handles as above.
    pub pipeline: BulletPipeline,
    pub rate_limits: RateLimits,
    pub config: Config,
}

impl FromRef<AppState> for SharedVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}
