mod auth;
mod config;
mod db;
mod embedding;
mod errors;
mod extract;
mod generation;
mod llm_client;
mod rate_limit;
mod records;
mod routes;
mod search;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::JwksVerifier;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::embedding::cohere::CohereEmbedder;
use crate::generation::pipeline::{BulletPipeline, PipelineSettings};
use crate::llm_client::LlmClient;
use crate::rate_limit::RateLimits;
use crate::records::store::PgRecordStore;
use crate::routes::build_router;
use crate::state::AppState;

/// Records the no-selection branch of generation draws from.
const RETRIEVAL_K: usize = 3;
const GENERATION_TEMPERATURE: f32 = 0.3;
/// How often idle clients are evicted from the rate limiters.
const RATE_LIMIT_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and make sure the schema exists
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    ensure_schema(&db, config.embedding_dimensions).await?;

    // One HTTP client shared by every outbound integration
    let http = reqwest::Client::new();

    let embedder = Arc::new(CohereEmbedder::new(
        http.clone(),
        config.embedding_api_key.clone(),
        config.embedding_dimensions,
        config.embedding_timeout,
    ));
    if config.embedding_api_key.is_none() {
        tracing::warn!("EMBEDDING_API_KEY is not set; record writes and search will fail");
    }
    info!(
        "Embedding client initialized (model: {}, {} dimensions)",
        embedding::cohere::MODEL,
        config.embedding_dimensions
    );

    let generator = Arc::new(LlmClient::new(http.clone(), config.generation_api_key.clone()));
    if config.generation_api_key.is_none() {
        tracing::warn!("GENERATION_API_KEY is not set; generation will fail");
    }
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let store = Arc::new(PgRecordStore::new(db));
    let verifier = Arc::new(JwksVerifier::new(http, &config.identity_provider_url));

    let pipeline = BulletPipeline::new(
        embedder.clone(),
        generator.clone(),
        store.clone(),
        PipelineSettings {
            retrieval_k: RETRIEVAL_K,
            search_limits: config.search_limits(),
            temperature: GENERATION_TEMPERATURE,
            generation_timeout: config.generation_timeout,
        },
    );

    let rate_limits = RateLimits::from_config(&config.rate_limits);
    rate_limits.spawn_cleanup(RATE_LIMIT_CLEANUP_PERIOD);

    // Build app state
    let state = AppState {
        embedder,
        generator,
        store,
        verifier,
        pipeline,
        rate_limits,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.cors_origins)),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
