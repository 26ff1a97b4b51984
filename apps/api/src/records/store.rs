//! Record persistence. Every query is scoped by `owner_id`; there is no method
//! that can read or write another owner's rows.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::info;

use crate::embedding::Embedding;
use crate::records::models::{EmbeddedRecord, Record, RecordRow};

/// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record '{0}' already exists")]
    Conflict(String),

    #[error("stored row is invalid: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Scoped CRUD plus nearest-neighbour lookup. Carried in `AppState` as
/// `Arc<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &EmbeddedRecord) -> Result<(), StoreError>;

    /// Inserts all records in one transaction; either every row commits or none does.
    async fn insert_batch(&self, records: &[EmbeddedRecord]) -> Result<(), StoreError>;

    /// Replaces the record's fields and embedding. Returns `false` when
    /// `(owner, id)` does not exist.
    async fn update(&self, record: &EmbeddedRecord) -> Result<bool, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StoreError>;

    /// All of the owner's records, newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<Record>, StoreError>;

    /// The subset of `ids` that exist for this owner, in no particular order.
    async fn get_many(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Record>, StoreError>;

    /// Up to `k` of the owner's records ordered by ascending cosine distance to
    /// `vector`. Order among equal distances is unspecified; callers re-sort.
    async fn find_nearest(
        &self,
        owner_id: &str,
        vector: &Embedding,
        k: usize,
    ) -> Result<Vec<(Record, f64)>, StoreError>;
}

#[derive(Debug, FromRow)]
struct NearestRow {
    #[sqlx(flatten)]
    record: RecordRow,
    distance: f64,
}

const RECORD_COLUMNS: &str = "id, owner_id, category, title, date_range, skills, industry, \
    tags, content, created_at, updated_at";

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_record(row: RecordRow) -> Result<Record, StoreError> {
    Record::try_from(row).map_err(StoreError::Corrupt)
}

fn map_insert_error(err: sqlx::Error, id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(id.to_string())
        }
        _ => StoreError::Database(err),
    }
}

async fn insert_one<'e, E>(executor: E, embedded: &EmbeddedRecord) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let r = embedded.record();
    sqlx::query(
        r#"
        INSERT INTO records
            (id, owner_id, category, title, date_range, skills, industry, tags,
             content, embedding, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::text::vector, $11, $11)
        "#,
    )
    .bind(&r.id)
    .bind(&r.owner_id)
    .bind(r.category.as_str())
    .bind(&r.title)
    .bind(&r.date_range)
    .bind(&r.skills)
    .bind(&r.industry)
    .bind(&r.tags)
    .bind(&r.content)
    .bind(embedded.embedding().to_pg_literal())
    .bind(r.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_insert_error(e, &r.id))?;
    Ok(())
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &EmbeddedRecord) -> Result<(), StoreError> {
        insert_one(&self.pool, record).await?;
        info!(
            "Inserted record {} for owner {}",
            record.record().id,
            record.record().owner_id
        );
        Ok(())
    }

    async fn insert_batch(&self, records: &[EmbeddedRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            // Dropping `tx` on the error path rolls the whole batch back.
            insert_one(&mut *tx, record).await?;
        }
        tx.commit().await?;
        info!("Inserted batch of {} records", records.len());
        Ok(())
    }

    async fn update(&self, embedded: &EmbeddedRecord) -> Result<bool, StoreError> {
        let r = embedded.record();
        let result = sqlx::query(
            r#"
            UPDATE records
            SET category = $1, title = $2, date_range = $3, skills = $4, industry = $5,
                tags = $6, content = $7, embedding = $8::text::vector, updated_at = $9
            WHERE id = $10 AND owner_id = $11
            "#,
        )
        .bind(r.category.as_str())
        .bind(&r.title)
        .bind(&r.date_range)
        .bind(&r.skills)
        .bind(&r.industry)
        .bind(&r.tags)
        .bind(&r.content)
        .bind(embedded.embedding().to_pg_literal())
        .bind(r.updated_at)
        .bind(&r.id)
        .bind(&r.owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<Record>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = $1 \
             ORDER BY created_at DESC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_record).collect()
    }

    async fn get_many(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Record>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = $1 AND id = ANY($2)"
        ))
        .bind(owner_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(to_record).collect()
    }

    async fn find_nearest(
        &self,
        owner_id: &str,
        vector: &Embedding,
        k: usize,
    ) -> Result<Vec<(Record, f64)>, StoreError> {
        let rows = sqlx::query_as::<_, NearestRow>(&format!(
            "SELECT {RECORD_COLUMNS}, (embedding <=> $2::text::vector)::float8 AS distance \
             FROM records WHERE owner_id = $1 \
             ORDER BY embedding <=> $2::text::vector \
             LIMIT $3"
        ))
        .bind(owner_id)
        .bind(vector.to_pg_literal())
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Ok((to_record(row.record)?, row.distance)))
            .collect()
    }
}
