//! PostgreSQL + pgvector backend against a live database.
//!
//! Ignored by default. Run with a database that has the `vector` extension
//! available:
//!
//! ```sh
//! DATABASE_URL=postgres://postgres:pw@127.0.0.1/testdb cargo test --test pgvector_tests -- --ignored
//! ```

use rerank_bench::{BenchError, Document, PgVectorStore, Snapshot, VectorStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};

const COLUMN: &str = "emb_3d";

static TABLE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A pool plus a freshly created table, dropped again by [`TestTable::drop_table`].
struct TestTable {
    pool: PgPool,
    name: String,
}

impl TestTable {
    async fn create() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();

        let name = format!(
            "rerank_bench_test_{}_{}",
            std::process::id(),
            TABLE_COUNTER.fetch_add(1, Ordering::SeqCst)
        );
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(&format!(
            "CREATE TABLE {name} (\
                id BIGINT PRIMARY KEY, \
                title TEXT, \
                update_time TIMESTAMP, \
                messages TEXT, \
                conversation_id TEXT, \
                {COLUMN} vector(3))"
        ))
        .execute(&pool)
        .await
        .unwrap();

        Some(Self { pool, name })
    }

    fn store(&self) -> PgVectorStore {
        PgVectorStore::from_pool(self.pool.clone())
    }

    async fn row_count(&self) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.name))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn drop_table(self) {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.name))
            .execute(&self.pool)
            .await
            .unwrap();
        self.pool.close().await;
    }
}

fn doc(id: i64, vector: Vec<f32>) -> Document {
    Document::new(id, format!("chunk {}", id)).with_embedding(COLUMN, vector)
}

async fn seed(table: &TestTable, store: &PgVectorStore) {
    let docs = vec![
        doc(1, vec![1.0, 0.0, 0.0]),
        doc(2, vec![0.9, 0.1, 0.0]),
        doc(3, vec![0.0, 1.0, 0.0]),
        doc(4, vec![1.0, 0.0, 0.0]),
        Document::new(5, "no embedding"),
    ];
    store.upsert_documents(&table.name, &docs).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_fetch_embedding_and_not_found() {
    let Some(table) = TestTable::create().await else {
        return;
    };
    let store = table.store();
    seed(&table, &store).await;

    let v = store.fetch_embedding(&table.name, COLUMN, 2).await.unwrap();
    assert!((v[0] - 0.9).abs() < 1e-6);
    assert!((v[1] - 0.1).abs() < 1e-6);

    let err = store
        .fetch_embedding(&table.name, COLUMN, 99)
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::NotFound { id: 99, .. }));

    // Row exists, column is NULL
    let err = store
        .fetch_embedding(&table.name, COLUMN, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::NotFound { id: 5, .. }));

    table.drop_table().await;
}

#[tokio::test]
#[ignore]
async fn test_similarity_search_excludes_by_id_and_skips_nulls() {
    let Some(table) = TestTable::create().await else {
        return;
    };
    let store = table.store();
    seed(&table, &store).await;

    // Document 4 duplicates document 1 and must survive the exclusion of 1
    let results = store
        .similarity_search(&table.name, COLUMN, &[1.0, 0.0, 0.0], 10, Some(1))
        .await
        .unwrap();
    assert_eq!(results.ids(), vec![4, 2, 3]);
    assert!((results.candidates[0].similarity - 1.0).abs() < 1e-6);
    assert!(
        results
            .similarities()
            .windows(2)
            .all(|w| w[0] >= w[1] - 1e-9)
    );

    let results = store
        .similarity_search(&table.name, COLUMN, &[1.0, 0.0, 0.0], 2, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(!results.ids().contains(&5));

    let err = store
        .similarity_search(&table.name, COLUMN, &[1.0, 0.0, 0.0], 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::InvalidInput(_)));

    table.drop_table().await;
}

#[tokio::test]
#[ignore]
async fn test_failed_upsert_rolls_back_row() {
    let Some(table) = TestTable::create().await else {
        return;
    };
    let store = table.store();

    // vector(3) column rejects a 2-d vector after the row insert succeeded
    let err = store
        .upsert_document(&table.name, &doc(10, vec![1.0, 0.0]))
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::Query(_)));
    assert_eq!(table.row_count().await, 0);

    let missing_column = Document::new(11, "text").with_embedding("absent_3d", vec![1.0, 0.0, 0.0]);
    assert!(store.upsert_document(&table.name, &missing_column).await.is_err());
    assert_eq!(table.row_count().await, 0);

    table.drop_table().await;
}

#[tokio::test]
#[ignore]
async fn test_snapshot_import_is_atomic() {
    let Some(table) = TestTable::create().await else {
        return;
    };
    let store = table.store();

    let snapshot = Snapshot::new(
        table.name.clone(),
        vec![COLUMN.to_string()],
        vec![doc(1, vec![1.0, 0.0, 0.0]), doc(2, vec![0.5, 0.5])],
    );
    assert!(snapshot.import_into(&store, &table.name).await.is_err());
    assert_eq!(table.row_count().await, 0);

    let snapshot = Snapshot::new(
        table.name.clone(),
        vec![COLUMN.to_string()],
        vec![doc(1, vec![1.0, 0.0, 0.0]), doc(2, vec![0.5, 0.5, 0.0])],
    );
    assert_eq!(snapshot.import_into(&store, &table.name).await.unwrap(), 2);

    let exported = Snapshot::from_store(&store, &table.name, vec![COLUMN.to_string()])
        .await
        .unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported.documents[1].text, "chunk 2");

    table.drop_table().await;
}

#[tokio::test]
#[ignore]
async fn test_upsert_embedding_requires_row() {
    let Some(table) = TestTable::create().await else {
        return;
    };
    let store = table.store();
    seed(&table, &store).await;

    store
        .upsert_embedding(&table.name, COLUMN, 5, &[0.0, 0.0, 1.0])
        .await
        .unwrap();
    let v = store.fetch_embedding(&table.name, COLUMN, 5).await.unwrap();
    assert_eq!(v, vec![0.0, 0.0, 1.0]);

    let err = store
        .upsert_embedding(&table.name, COLUMN, 42, &[0.0, 0.0, 1.0])
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::NotFound { id: 42, .. }));

    store.health_check().await.unwrap();
    table.drop_table().await;
}
