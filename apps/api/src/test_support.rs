//! Deterministic stand-ins for the embedding backend, the generation backend and
//! the datastore, used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::{EmbedMode, Embedder, Embedding, EmbeddingError};
use crate::llm_client::{GenerationError, TextGenerator};
use crate::records::models::{EmbeddedRecord, Record};
use crate::records::store::{RecordStore, StoreError};

pub const TEST_DIMS: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Embedders
// ────────────────────────────────────────────────────────────────────────────

/// Bag-of-words hashing embedder. Slot 0 is a constant bias shared by every
/// text, so any two non-empty texts have strictly positive cosine similarity and
/// identical texts have similarity 1.
pub struct HashEmbedder {
    actual: usize,
    reported: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            actual: dims,
            reported: dims,
        }
    }

    /// Returns `actual`-length vectors while claiming `reported` dimensions.
    pub fn misreporting(actual: usize, reported: usize) -> Self {
        Self { actual, reported }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.actual];
        v[0] = 1.0;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let slot = 1 + (fnv1a(&token.to_lowercase()) as usize % (self.actual - 1));
            v[slot] += 1.0;
        }
        v
    }
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.reported
    }

    async fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Embedding, EmbeddingError> {
        Embedding::checked(self.vectorize(text), self.actual)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts
            .iter()
            .map(|t| Embedding::checked(self.vectorize(t), self.actual))
            .collect()
    }
}

pub enum FailingEmbedder {
    Unavailable,
    Timeout,
}

impl FailingEmbedder {
    pub fn unavailable() -> Self {
        FailingEmbedder::Unavailable
    }

    pub fn timeout() -> Self {
        FailingEmbedder::Timeout
    }

    fn error(&self) -> EmbeddingError {
        match self {
            FailingEmbedder::Unavailable => {
                EmbeddingError::Unavailable("EMBEDDING_API_KEY is not set".into())
            }
            FailingEmbedder::Timeout => EmbeddingError::Timeout(Duration::from_secs(30)),
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dimensions(&self) -> usize {
        TEST_DIMS
    }

    async fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<Embedding, EmbeddingError> {
        Err(self.error())
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        Err(self.error())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Timeout,
    RateLimited,
    Backend(u16, String),
}

impl Scripted {
    fn into_result(self) -> Result<String, GenerationError> {
        match self {
            Scripted::Text(t) => Ok(t),
            Scripted::Timeout => Err(GenerationError::Timeout(Duration::from_secs(60))),
            Scripted::RateLimited => Err(GenerationError::RateLimited),
            Scripted::Backend(status, message) => Err(GenerationError::Backend { status, message }),
        }
    }
}

/// Answers each prompt with the first rule whose needle occurs in it, falling
/// back to a default. Records every call.
pub struct ScriptedGenerator {
    rules: Vec<(String, Scripted)>,
    default: Scripted,
    calls: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    pub fn always(response: Scripted) -> Self {
        Self {
            rules: Vec::new(),
            default: response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn when(mut self, needle: &str, response: Scripted) -> Self {
        self.rules.push((needle.to_string(), response));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        _timeout: Duration,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));
        let response = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.default.clone());
        response.into_result()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Datastore
// ────────────────────────────────────────────────────────────────────────────

/// In-memory store computing exact cosine distance, with the same ordering and
/// scoping rules as the Postgres store.
#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: Mutex<HashMap<(String, String), (Record, Embedding)>>,
}

impl InMemoryRecordStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn embedding_of(&self, owner_id: &str, id: &str) -> Option<Embedding> {
        self.rows
            .lock()
            .unwrap()
            .get(&(owner_id.to_string(), id.to_string()))
            .map(|(_, e)| e.clone())
    }
}

fn key(record: &Record) -> (String, String) {
    (record.owner_id.clone(), record.id.clone())
}

/// Cosine distance in `[0, 2]`; zero vectors are treated as orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut na = 0.0_f64;
    let mut nb = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: &EmbeddedRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let k = key(record.record());
        if rows.contains_key(&k) {
            return Err(StoreError::Conflict(k.1));
        }
        rows.insert(k, (record.record().clone(), record.embedding().clone()));
        Ok(())
    }

    async fn insert_batch(&self, records: &[EmbeddedRecord]) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = records
            .iter()
            .map(|r| key(r.record()))
            .find(|k| rows.contains_key(k))
        {
            return Err(StoreError::Conflict(existing.1));
        }
        for r in records {
            rows.insert(key(r.record()), (r.record().clone(), r.embedding().clone()));
        }
        Ok(())
    }

    async fn update(&self, record: &EmbeddedRecord) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&key(record.record())) {
            Some(slot) => {
                let created_at = slot.0.created_at;
                let mut updated = record.record().clone();
                updated.created_at = created_at;
                *slot = (updated, record.embedding().clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .remove(&(owner_id.to_string(), id.to_string()))
            .is_some())
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        let mut out: Vec<Record> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|(r, _)| r.owner_id == owner_id)
            .map(|(r, _)| r.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn get_many(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Record>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(&(owner_id.to_string(), id.clone())))
            .map(|(r, _)| r.clone())
            .collect())
    }

    async fn find_nearest(
        &self,
        owner_id: &str,
        vector: &Embedding,
        k: usize,
    ) -> Result<Vec<(Record, f64)>, StoreError> {
        let mut scored: Vec<(Record, f64)> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|(r, _)| r.owner_id == owner_id)
            .map(|(r, e)| (r.clone(), cosine_distance(vector.as_slice(), e.as_slice())))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        scored.truncate(k);
        Ok(scored)
    }
}
