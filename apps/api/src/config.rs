use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::rate_limit::RateLimitConfig;
use crate::search::SearchLimits;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or a tunable does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub identity_provider_url: String,
    /// Absent keys are not a startup error; calls fail as "unavailable" instead.
    pub embedding_api_key: Option<String>,
    pub generation_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub cors_origins: Vec<String>,
    pub embedding_dimensions: usize,
    pub max_search_results: usize,
    pub min_relevance: f64,
    pub embedding_timeout: Duration,
    pub generation_timeout: Duration,
    pub db_max_connections: u32,
    pub rate_limits: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let min_relevance: f64 = parse_or(&get, "MIN_RELEVANCE", 0.0)?;
        if !(0.0..=1.0).contains(&min_relevance) {
            bail!("MIN_RELEVANCE must be between 0 and 1");
        }
        let embedding_dimensions: usize = parse_or(&get, "EMBEDDING_DIMENSIONS", 384)?;
        if embedding_dimensions == 0 {
            bail!("EMBEDDING_DIMENSIONS must be positive");
        }
        let max_search_results: usize = parse_or(&get, "MAX_SEARCH_RESULTS", 20)?;
        if max_search_results == 0 {
            bail!("MAX_SEARCH_RESULTS must be positive");
        }

        Ok(Config {
            database_url: require(&get, "DATABASE_URL")?,
            identity_provider_url: require(&get, "IDENTITY_PROVIDER_URL")?,
            embedding_api_key: get("EMBEDDING_API_KEY"),
            generation_api_key: get("GENERATION_API_KEY"),
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            cors_origins: parse_cors_origins(
                &get("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:3000".to_string()),
            )?,
            embedding_dimensions,
            max_search_results,
            min_relevance,
            embedding_timeout: Duration::from_secs(parse_or(&get, "EMBEDDING_TIMEOUT_SECS", 30)?),
            generation_timeout: Duration::from_secs(parse_or(
                &get,
                "GENERATION_TIMEOUT_SECS",
                60,
            )?),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            rate_limits: RateLimitConfig::default(),
        })
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_results: self.max_search_results,
            min_relevance: self.min_relevance,
        }
    }
}

fn require(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

/// Comma-separated explicit origins. A wildcard is refused because the API
/// allows credentials.
pub fn parse_cors_origins(raw: &str) -> Result<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();
    if origins.iter().any(|origin| origin == "*") {
        bail!("CORS_ORIGINS must list explicit origins, '*' is not allowed");
    }
    if origins.is_empty() {
        bail!("CORS_ORIGINS must list at least one origin");
    }
    Ok(origins)
}
