use anyhow::{bail, Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the pgvector extension, the records table and its HNSW index if they
/// do not exist yet. The embedding column width is fixed at creation time.
pub async fn ensure_schema(pool: &PgPool, dimensions: usize) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await
        .context("failed to enable the pgvector extension")?;

    sqlx::query(&records_table_ddl(dimensions))
        .execute(pool)
        .await
        .context("failed to create the records table")?;

    // pgvector stores the declared width as the column's typmod
    let (width,): (i32,) = sqlx::query_as(
        "SELECT atttypmod FROM pg_attribute \
         WHERE attrelid = 'records'::regclass AND attname = 'embedding'",
    )
    .fetch_one(pool)
    .await
    .context("failed to read the embedding column width")?;
    check_embedding_width(width, dimensions)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS records_embedding_idx \
         ON records USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await
    .context("failed to create the embedding index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS records_owner_created_idx ON records (owner_id, created_at DESC)")
        .execute(pool)
        .await
        .context("failed to create the owner index")?;

    info!("Database schema ready (embedding dimensions: {dimensions})");
    Ok(())
}

/// Fails when an existing records table was created for a different model width.
fn check_embedding_width(existing: i32, configured: usize) -> Result<()> {
    if usize::try_from(existing).ok() != Some(configured) {
        bail!(
            "records.embedding is vector({existing}) but EMBEDDING_DIMENSIONS is {configured}; \
             re-embed into a new table or fix the configuration"
        );
    }
    Ok(())
}

fn records_table_ddl(dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS records (
            owner_id    TEXT        NOT NULL,
            id          TEXT        NOT NULL,
            category    TEXT        NOT NULL CHECK (category IN ('work', 'project', 'volunteering')),
            title       TEXT        NOT NULL,
            date_range  TEXT,
            skills      TEXT[]      NOT NULL DEFAULT '{{}}',
            industry    TEXT[]      NOT NULL DEFAULT '{{}}',
            tags        TEXT[]      NOT NULL DEFAULT '{{}}',
            content     TEXT        NOT NULL,
            embedding   vector({dimensions}) NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (owner_id, id)
        )"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_uses_configured_dimensions() {
        let ddl = records_table_ddl(384);
        assert!(ddl.contains("embedding   vector(384) NOT NULL"));
        assert!(ddl.contains("PRIMARY KEY (owner_id, id)"));
        assert!(ddl.contains("DEFAULT '{}'"));
    }

    #[test]
    fn test_embedding_width_must_match_configuration() {
        assert!(check_embedding_width(1024, 1024).is_ok());

        let err = check_embedding_width(384, 1024).unwrap_err().to_string();
        assert!(err.contains("vector(384)"));
        assert!(err.contains("1024"));

        // untyped column reports -1
        assert!(check_embedding_width(-1, 1024).is_err());
    }
}
