//! Turns record content and search text into fixed-length vectors.
//!
//! Every vector that leaves this module has passed the dimensionality check, so
//! nothing downstream (persistence, similarity search) ever sees a vector of the
//! wrong length.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cohere;

/// Which side of a comparison a text is on. Query vectors are only ever compared
/// against document vectors produced by the same model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    Document,
    Query,
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("embedding request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("embedding backend is rate limiting requests")]
    RateLimited,

    #[error("embedding has {actual} dimensions, deployment expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding backend returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding backend error (status {status}): {message}")]
    Backend { status: u16, message: String },
}

/// A vector that is known to match the deployment's dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wraps a raw vector, rejecting it if its length is not `expected`.
    pub fn checked(values: Vec<f32>, expected: usize) -> Result<Self, EmbeddingError> {
        if values.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    /// Renders the vector as a pgvector text literal, e.g. `[0.1,0.2,0.3]`.
    pub fn to_pg_literal(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 10 + 2);
        out.push('[');
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&v.to_string());
        }
        out.push(']');
        out
    }
}

/// The embedding service boundary. Carried in `AppState` as `Arc<dyn Embedder>`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed dimensionality of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Embedding, EmbeddingError>;

    /// Embeds many documents at once. Output order matches input order; any
    /// failure fails the whole batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;
}

/// Validates a backend batch response against the request, in input order.
pub fn check_batch(
    raw: Vec<Vec<f32>>,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Embedding>, EmbeddingError> {
    if raw.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: raw.len(),
        });
    }
    raw.into_iter()
        .map(|v| Embedding::checked(v, dimensions))
        .collect()
}
