//! Cohere-backed embedder (`embed-english-light-v3.0`, 384 dimensions).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_batch, EmbedMode, Embedder, Embedding, EmbeddingError};

const COHERE_EMBED_URL: &str = "https://api.cohere.com/v2/embed";
pub const MODEL: &str = "embed-english-light-v3.0";
/// Upper bound on texts per embed call accepted by the backend.
const MAX_TEXTS_PER_CALL: usize = 96;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'a str,
    embedding_types: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsByType {
    float: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct CohereError {
    message: String,
}

#[derive(Clone)]
pub struct CohereEmbedder {
    client: Client,
    api_key: Option<String>,
    dimensions: usize,
    timeout: Duration,
}

impl CohereEmbedder {
    pub fn new(client: Client, api_key: Option<String>, dimensions: usize, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            dimensions,
            timeout,
        }
    }

    async fn call(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EmbeddingError::Unavailable("EMBEDDING_API_KEY is not set".into()))?;

        let body = EmbedRequest {
            model: MODEL,
            texts,
            input_type: input_type(mode),
            embedding_types: ["float"],
        };

        let response = self
            .client
            .post(COHERE_EMBED_URL)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CohereError>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    EmbeddingError::Unavailable(format!("credential rejected: {message}"))
                }
                StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited,
                _ => EmbeddingError::Backend {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!("Embedded {} text(s) in {:?} mode", texts.len(), mode);
        Ok(parsed.embeddings.float)
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout)
        } else {
            EmbeddingError::Unavailable(err.to_string())
        }
    }
}

fn input_type(mode: EmbedMode) -> &'static str {
    match mode {
        EmbedMode::Document => "search_document",
        EmbedMode::Query => "search_query",
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Embedding, EmbeddingError> {
        let raw = self.call(&[text.to_string()], mode).await?;
        let mut vectors = check_batch(raw, 1, self.dimensions)?;
        vectors
            .pop()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_TEXTS_PER_CALL) {
            let raw = self.call(chunk, EmbedMode::Document).await?;
            out.extend(check_batch(raw, chunk.len(), self.dimensions)?);
        }
        Ok(out)
    }
}
