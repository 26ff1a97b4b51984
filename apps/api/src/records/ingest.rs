//! Record ingestion: compute the embedding first, then perform a single write.
//!
//! An embedding failure returns before the store is touched, so a record is never
//! persisted without a vector matching its current content.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::embedding::{EmbedMode, Embedder, EmbeddingError};
use crate::errors::AppError;
use crate::records::models::{EmbeddedRecord, Record, RecordInput};
use crate::records::store::RecordStore;
use crate::records::validation::{validate_batch, validate_record_id, validate_record_input};

pub async fn create_record(
    embedder: &dyn Embedder,
    store: &dyn RecordStore,
    owner_id: &str,
    input: RecordInput,
) -> Result<Record, AppError> {
    validate_record_input(&input)?;
    let id = input
        .id
        .as_deref()
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let record = input.into_record(id, owner_id, Utc::now());

    let embedding = embedder.embed(&record.content, EmbedMode::Document).await?;
    let embedded = EmbeddedRecord::new(record, embedding, embedder.dimensions())?;

    store.insert(&embedded).await?;
    Ok(embedded.record().clone())
}

/// Creates every record or none. Embeddings for the whole batch are computed in
/// one backend call before the transactional insert.
pub async fn create_batch(
    embedder: &dyn Embedder,
    store: &dyn RecordStore,
    owner_id: &str,
    inputs: Vec<RecordInput>,
) -> Result<Vec<Record>, AppError> {
    validate_batch(&inputs)?;
    let now = Utc::now();
    let records: Vec<Record> = inputs
        .into_iter()
        .map(|input| {
            let id = input
                .id
                .as_deref()
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            input.into_record(id, owner_id, now)
        })
        .collect();

    let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != records.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: records.len(),
            actual: embeddings.len(),
        }
        .into());
    }

    let dimensions = embedder.dimensions();
    let embedded = records
        .into_iter()
        .zip(embeddings)
        .map(|(record, embedding)| EmbeddedRecord::new(record, embedding, dimensions))
        .collect::<Result<Vec<_>, _>>()?;

    store.insert_batch(&embedded).await?;
    info!("Ingested {} records for owner {owner_id}", embedded.len());
    Ok(embedded.into_iter().map(|e| e.record().clone()).collect())
}

/// Replaces a record's fields, re-embedding the new content before the write.
pub async fn update_record(
    embedder: &dyn Embedder,
    store: &dyn RecordStore,
    owner_id: &str,
    id: &str,
    input: RecordInput,
) -> Result<Record, AppError> {
    validate_record_id(id)?;
    validate_record_input(&input)?;
    let record = input.into_record(id.trim().to_string(), owner_id, Utc::now());

    let embedding = embedder.embed(&record.content, EmbedMode::Document).await?;
    let embedded = EmbeddedRecord::new(record, embedding, embedder.dimensions())?;

    if !store.update(&embedded).await? {
        return Err(AppError::NotFound(format!("Record {id} not found")));
    }
    Ok(embedded.record().clone())
}

pub async fn delete_record(
    store: &dyn RecordStore,
    owner_id: &str,
    id: &str,
) -> Result<(), AppError> {
    validate_record_id(id)?;
    let id = id.trim();
    if !store.delete(owner_id, id).await? {
        return Err(AppError::NotFound(format!("Record {id} not found")));
    }
    info!("Deleted record {id} for owner {owner_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::models::Category;
    use crate::test_support::{FailingEmbedder, HashEmbedder, InMemoryRecordStore, TEST_DIMS};

    fn input(id: Option<&str>, content: &str) -> RecordInput {
        RecordInput {
            id: id.map(String::from),
            category: Category::Project,
            title: "Caching layer".to_string(),
            date_range: None,
            skills: vec!["Redis".to_string()],
            industry: vec![],
            tags: vec![],
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_persists_with_fresh_embedding() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();

        let record = create_record(&embedder, &store, "alice", input(Some("p1"), "Built a cache"))
            .await
            .unwrap();

        assert_eq!(record.id, "p1");
        let stored = store.embedding_of("alice", "p1").unwrap();
        let expected = embedder.embed("Built a cache", EmbedMode::Document).await.unwrap();
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_create_assigns_id_when_missing() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        let record = create_record(&embedder, &store, "alice", input(None, "Built a cache"))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[tokio::test]
    async fn test_embedding_failure_prevents_write() {
        let store = InMemoryRecordStore::default();
        let result = create_record(
            &FailingEmbedder::unavailable(),
            &store,
            "alice",
            input(Some("p1"), "Built a cache"),
        )
        .await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected_before_persistence() {
        // Embedder claims 8 dims but returns 4-dim vectors.
        let embedder = HashEmbedder::misreporting(4, 8);
        let store = InMemoryRecordStore::default();
        let result =
            create_record(&embedder, &store, "alice", input(Some("p1"), "Built a cache")).await;
        assert!(result.is_err());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_validation_error() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "a"))
            .await
            .unwrap();
        let err = create_record(&embedder, &store, "alice", input(Some("p1"), "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_same_id_allowed_for_different_owners() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "a"))
            .await
            .unwrap();
        assert!(create_record(&embedder, &store, "bob", input(Some("p1"), "b"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_batch_commits_all_records() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        let created = create_batch(
            &embedder,
            &store,
            "alice",
            vec![input(Some("a"), "one"), input(Some("b"), "two")],
        )
        .await
        .unwrap();
        assert_eq!(
            created.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_conflict_commits_nothing() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("b"), "existing"))
            .await
            .unwrap();

        let result = create_batch(
            &embedder,
            &store,
            "alice",
            vec![input(Some("a"), "one"), input(Some("b"), "two")],
        )
        .await;
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert!(store.embedding_of("alice", "a").is_none());
    }

    #[tokio::test]
    async fn test_batch_embedding_failure_commits_nothing() {
        let store = InMemoryRecordStore::default();
        let result = create_batch(
            &FailingEmbedder::timeout(),
            &store,
            "alice",
            vec![input(Some("a"), "one")],
        )
        .await;
        assert!(matches!(result, Err(AppError::UpstreamTimeout(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_update_recomputes_embedding() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "old content"))
            .await
            .unwrap();

        update_record(&embedder, &store, "alice", "p1", input(None, "new content"))
            .await
            .unwrap();

        let stored = store.embedding_of("alice", "p1").unwrap();
        let expected = embedder.embed("new content", EmbedMode::Document).await.unwrap();
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn test_update_other_owners_record_is_not_found() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "a"))
            .await
            .unwrap();
        let err = update_record(&embedder, &store, "bob", "p1", input(None, "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "a"))
            .await
            .unwrap();

        assert!(matches!(
            delete_record(&store, "bob", "p1").await,
            Err(AppError::NotFound(_))
        ));
        delete_record(&store, "alice", "p1").await.unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_trims_id_like_update() {
        let embedder = HashEmbedder::new(TEST_DIMS);
        let store = InMemoryRecordStore::default();
        create_record(&embedder, &store, "alice", input(Some("p1"), "a"))
            .await
            .unwrap();

        delete_record(&store, "alice", " p1 ").await.unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_blank_id_is_validation_error() {
        let store = InMemoryRecordStore::default();
        assert!(matches!(
            delete_record(&store, "alice", "   ").await,
            Err(AppError::Validation(_))
        ));
    }
}
