use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::embedding::{Embedding, EmbeddingError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Project,
    Volunteering,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Project => "project",
            Category::Volunteering => "volunteering",
        }
    }

    /// Lenient parse used for model-produced drafts; anything unknown is work history.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "project" | "projects" => Category::Project,
            "volunteering" | "volunteer" => Category::Volunteering,
            _ => Category::Work,
        }
    }
}

impl TryFrom<&str> for Category {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "work" => Ok(Category::Work),
            "project" => Ok(Category::Project),
            "volunteering" => Ok(Category::Volunteering),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// A stored work / project / volunteering entry. The embedding is never part of
/// this type; it lives only in the datastore.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    pub id: String,
    #[serde(skip_serializing)]
    pub owner_id: String,
    pub category: Category,
    pub title: String,
    pub date_range: Option<String>,
    pub skills: Vec<String>,
    pub industry: Vec<String>,
    pub tags: Vec<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `records` row as selected by the store (embedding column excluded).
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: String,
    pub owner_id: String,
    pub category: String,
    pub title: String,
    pub date_range: Option<String>,
    pub skills: Vec<String>,
    pub industry: Vec<String>,
    pub tags: Vec<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for Record {
    type Error = String;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Record {
            category: Category::try_from(row.category.as_str())?,
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            date_range: row.date_range,
            skills: row.skills,
            industry: row.industry,
            tags: row.tags,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Request body for creating or replacing a record.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInput {
    /// Client-chosen id; assigned by the server when omitted. Ignored on update.
    pub id: Option<String>,
    #[serde(alias = "type")]
    pub category: Category,
    pub title: String,
    pub date_range: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub industry: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

impl RecordInput {
    /// Builds the record this input describes for `owner_id` under `id`.
    pub fn into_record(self, id: String, owner_id: &str, now: DateTime<Utc>) -> Record {
        Record {
            id,
            owner_id: owner_id.to_string(),
            category: self.category,
            title: self.title.trim().to_string(),
            date_range: self
                .date_range
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            skills: trim_all(self.skills),
            industry: trim_all(self.industry),
            tags: trim_all(self.tags),
            content: self.content.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn trim_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.trim().to_string()).collect()
}

/// A record paired with a freshly computed embedding of its current content.
///
/// The only way to obtain one is `EmbeddedRecord::new`, which enforces the
/// deployment's dimensionality, so the store can never be handed a stale or
/// mis-sized vector.
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    record: Record,
    embedding: Embedding,
}

impl EmbeddedRecord {
    pub fn new(
        record: Record,
        embedding: Embedding,
        dimensions: usize,
    ) -> Result<Self, EmbeddingError> {
        if embedding.dimensions() != dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimensions,
                actual: embedding.dimensions(),
            });
        }
        Ok(Self { record, embedding })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

/// A record proposal extracted from pasted profile text. Not persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordDraft {
    pub category: Category,
    pub title: String,
    pub date_range: Option<String>,
    pub skills: Vec<String>,
    pub content: String,
}
