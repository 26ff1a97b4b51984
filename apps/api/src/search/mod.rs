//! Owner-scoped nearest-neighbour retrieval over record embeddings.
//!
//! Relevance is `1 - cosine_distance`: 1.0 for identical vectors, 0.0 for orthogonal.
//! Results are ordered by descending relevance with ties broken by record id, and
//! an empty result is a normal outcome rather than an error.

use serde::Serialize;
use tracing::debug;

use crate::embedding::{EmbedMode, Embedder, Embedding};
use crate::errors::AppError;
use crate::records::models::Record;
use crate::records::store::RecordStore;

pub mod handlers;

/// Deployment-wide search bounds, taken from `Config`.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_results: usize,
    pub min_relevance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: Record,
    pub relevance: f64,
}

/// Runs a nearest-neighbour query for `owner_id`.
///
/// `k` is clamped to `limits.max_results` before reaching the store. Every
/// returned record belongs to `owner_id`; anything else coming back from the
/// store is dropped and logged.
pub async fn search(
    store: &dyn RecordStore,
    query: &Embedding,
    owner_id: &str,
    k: usize,
    limits: SearchLimits,
) -> Result<Vec<ScoredRecord>, AppError> {
    let k = k.min(limits.max_results);
    if k == 0 {
        return Ok(Vec::new());
    }

    let nearest = store.find_nearest(owner_id, query, k).await?;

    let mut results: Vec<ScoredRecord> = nearest
        .into_iter()
        .filter(|(record, _)| {
            let same_owner = record.owner_id == owner_id;
            if !same_owner {
                tracing::error!(
                    "Store returned record {} outside owner scope; dropping",
                    record.id
                );
            }
            same_owner
        })
        .map(|(record, distance)| ScoredRecord {
            record,
            relevance: 1.0 - distance,
        })
        .filter(|scored| scored.relevance >= limits.min_relevance)
        .collect();

    results.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    results.truncate(k);

    debug!(
        "Search for owner {owner_id} returned {} result(s) (k={k}, min_relevance={})",
        results.len(),
        limits.min_relevance
    );
    Ok(results)
}

/// Embeds `text` in query mode and searches with it.
pub async fn search_text(
    embedder: &dyn Embedder,
    store: &dyn RecordStore,
    owner_id: &str,
    text: &str,
    k: usize,
    limits: SearchLimits,
) -> Result<Vec<ScoredRecord>, AppError> {
    let query = embedder.embed(text, EmbedMode::Query).await?;
    search(store, &query, owner_id, k, limits).await
}
