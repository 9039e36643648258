//! End-to-end benchmark runs against the in-memory store.

use async_trait::async_trait;
use rerank_bench::{
    BenchError, Benchmark, BenchmarkConfig, CandidateSet, CosineReranker, Document, DocumentId,
    FailurePolicy, InMemoryVectorStore, RerankDocument, RerankResult, Reranker, Result, Snapshot,
    VectorStore, load_snapshot, save_snapshot,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const TABLE: &str = "conversations";
const COLUMN: &str = "emb_2d";

/// Unit vectors spread 0.1 rad apart, so neighbours are predictable.
fn documents(count: i64) -> Vec<Document> {
    (0..count)
        .map(|id| {
            let angle = id as f32 * 0.1;
            Document::new(id, format!("chunk {}", id))
                .with_embedding(COLUMN, vec![angle.cos(), angle.sin()])
        })
        .collect()
}

async fn store(count: i64) -> InMemoryVectorStore {
    InMemoryVectorStore::from_documents(TABLE, &documents(count))
        .await
        .unwrap()
}

fn config() -> BenchmarkConfig {
    let mut config = BenchmarkConfig::new(TABLE, COLUMN);
    config.candidate_count = 5;
    config.top_k = 3;
    config
}

/// Cosine reranker that counts its calls and checks it sees every candidate.
#[derive(Default)]
struct CountingReranker {
    calls: AtomicUsize,
}

#[async_trait]
impl Reranker for CountingReranker {
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(top_n, documents.len());
        CosineReranker::new().rerank(query, documents, top_n).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Reranker that always fails with a fixed kind of error.
enum FailingReranker {
    Auth,
    Unavailable,
}

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _query: &RerankDocument,
        _documents: &[RerankDocument],
        _top_n: usize,
    ) -> Result<RerankResult> {
        match self {
            FailingReranker::Auth => Err(BenchError::OracleAuth("invalid api key".to_string())),
            FailingReranker::Unavailable => {
                Err(BenchError::OracleUnavailable("(503) overloaded".to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Reranker that drops every candidate but the best one.
struct TruncatingReranker;

#[async_trait]
impl Reranker for TruncatingReranker {
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult> {
        let mut result = CosineReranker::new().rerank(query, documents, top_n).await?;
        result.hits.truncate(1);
        Ok(result)
    }

    fn name(&self) -> &str {
        "truncating"
    }
}

/// Reranker whose earlier calls finish later than the ones after them.
struct StaggeredReranker {
    calls: AtomicUsize,
    slowest: u64,
}

#[async_trait]
impl Reranker for StaggeredReranker {
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        let delay = self.slowest.saturating_sub(call * 10);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        CosineReranker::new().rerank(query, documents, top_n).await
    }

    fn name(&self) -> &str {
        "staggered"
    }
}

/// Store wrapper that stalls every embedding fetch.
struct SlowStore {
    inner: InMemoryVectorStore,
    delay: Duration,
}

#[async_trait]
impl VectorStore for SlowStore {
    async fn fetch_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
    ) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_embedding(collection, column, id).await
    }

    async fn similarity_search(
        &self,
        collection: &str,
        column: &str,
        query: &[f32],
        k: usize,
        exclude: Option<DocumentId>,
    ) -> Result<CandidateSet> {
        self.inner
            .similarity_search(collection, column, query, k, exclude)
            .await
    }

    async fn upsert_document(&self, collection: &str, document: &Document) -> Result<()> {
        self.inner.upsert_document(collection, document).await
    }

    async fn upsert_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
        vector: &[f32],
    ) -> Result<()> {
        self.inner
            .upsert_embedding(collection, column, id, vector)
            .await
    }

    async fn list_documents(&self, collection: &str, columns: &[String]) -> Result<Vec<Document>> {
        self.inner.list_documents(collection, columns).await
    }
}

#[tokio::test]
async fn test_one_score_per_query_in_input_order() {
    let store = store(12).await;
    let reranker = CountingReranker::default();
    let ids: Vec<DocumentId> = vec![4, 0, 7, 2, 9];

    let results = Benchmark::new(&store, &reranker, config())
        .run(&ids)
        .await
        .unwrap();

    assert_eq!(results.query_ids, ids);
    assert_eq!(results.rerank_scores.len(), ids.len());
    assert_eq!(results.ndcg_scores.len(), ids.len());
    assert_eq!(results.cosine_sim_scores.len(), ids.len());
    assert!(results.skipped.is_empty());
    assert_eq!(reranker.calls.load(Ordering::SeqCst), ids.len());

    for (&ndcg, &cosine) in results.ndcg_scores.iter().zip(&results.cosine_sim_scores) {
        assert!((0.0..=1.0 + 1e-9).contains(&ndcg));
        assert!((-1.0..=1.0 + 1e-9).contains(&cosine));
    }
}

#[tokio::test]
async fn test_cosine_oracle_agrees_with_store_ranking() {
    let store = store(12).await;
    let reranker = CosineReranker::new();
    let ids: Vec<DocumentId> = (0..12).collect();

    let results = Benchmark::new(&store, &reranker, config())
        .run(&ids)
        .await
        .unwrap();

    for ndcg in &results.ndcg_scores {
        assert!((ndcg - 1.0).abs() < 1e-9, "ndcg {} should be 1.0", ndcg);
    }
    // Top-3 neighbours are at most 0.3 rad away
    for rerank in &results.rerank_scores {
        assert!(*rerank > 0.3f64.cos() - 1e-6);
    }
}

#[tokio::test]
async fn test_empty_id_list_produces_empty_results() {
    let store = store(4).await;
    let reranker = CountingReranker::default();

    let results = Benchmark::new(&store, &reranker, config())
        .run(&[])
        .await
        .unwrap();

    assert!(results.is_empty());
    assert!(results.avg_ndcg_score().is_nan());
    assert!(results.avg_rerank_score().is_nan());
    assert!(results.avg_cosine_sim_score().is_nan());
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_document_aborts_without_calling_oracle() {
    let store = store(4).await;
    let reranker = CountingReranker::default();

    let err = Benchmark::new(&store, &reranker, config())
        .run(&[99])
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::NotFound { id: 99, .. }));
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skip_policy_records_failed_queries() {
    let store = store(6).await;
    let reranker = CountingReranker::default();
    let mut config = config();
    config.failure_policy = FailurePolicy::Skip;

    let results = Benchmark::new(&store, &reranker, config)
        .run(&[0, 99, 1])
        .await
        .unwrap();

    assert_eq!(results.query_ids, vec![0, 1]);
    assert_eq!(results.skipped.len(), 1);
    assert_eq!(results.skipped[0].id, 99);
    assert!(results.skipped[0].error.contains("99"));
}

#[tokio::test]
async fn test_transient_oracle_failure_is_skippable() {
    let store = store(6).await;
    let mut config = config();
    config.failure_policy = FailurePolicy::Skip;

    let results = Benchmark::new(&store, &FailingReranker::Unavailable, config)
        .run(&[0, 1, 2])
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(results.skipped.len(), 3);
}

#[tokio::test]
async fn test_auth_failure_aborts_even_when_skipping() {
    let store = store(6).await;
    let mut config = config();
    config.failure_policy = FailurePolicy::Skip;

    let err = Benchmark::new(&store, &FailingReranker::Auth, config)
        .run(&[0, 1, 2])
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::OracleAuth(_)));
}

#[tokio::test]
async fn test_partial_rerank_result_is_rejected() {
    let store = store(6).await;

    let err = Benchmark::new(&store, &TruncatingReranker, config())
        .run(&[2])
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::OracleResponse(_)));

    let mut config = config();
    config.failure_policy = FailurePolicy::Skip;
    let results = Benchmark::new(&store, &TruncatingReranker, config)
        .run(&[2, 3])
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(results.skipped.len(), 2);
}

#[tokio::test]
async fn test_lone_document_has_no_candidates() {
    let store = store(1).await;
    let reranker = CountingReranker::default();

    let err = Benchmark::new(&store, &reranker, config())
        .run(&[0])
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::EmptyCandidateSet(0)));

    let mut config = config();
    config.failure_policy = FailurePolicy::Skip;
    let results = Benchmark::new(&store, &reranker, config)
        .run(&[0])
        .await
        .unwrap();
    assert_eq!(results.skipped.len(), 1);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_candidate_scores() {
    let store = store(2).await;
    let reranker = CosineReranker::new();

    let results = Benchmark::new(&store, &reranker, config())
        .run(&[0, 1])
        .await
        .unwrap();

    let expected = 0.1f64.cos();
    for i in 0..2 {
        assert_eq!(results.ndcg_scores[i], 1.0);
        assert!((results.cosine_sim_scores[i] - expected).abs() < 1e-6);
        assert!((results.rerank_scores[i] - results.cosine_sim_scores[i]).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_concurrent_run_keeps_input_order() {
    let store = store(12).await;
    let reranker = StaggeredReranker {
        calls: AtomicUsize::new(0),
        slowest: 80,
    };
    let ids: Vec<DocumentId> = (0..8).collect();

    let mut concurrent = config();
    concurrent.concurrency = 4;
    let parallel = Benchmark::new(&store, &reranker, concurrent)
        .run(&ids)
        .await
        .unwrap();

    let sequential = Benchmark::new(&store, &CosineReranker::new(), config())
        .run(&ids)
        .await
        .unwrap();

    assert_eq!(parallel.query_ids, ids);
    assert_eq!(parallel.ndcg_scores, sequential.ndcg_scores);
    assert_eq!(parallel.rerank_scores, sequential.rerank_scores);
    assert_eq!(parallel.cosine_sim_scores, sequential.cosine_sim_scores);
}

#[tokio::test]
async fn test_run_deadline_aborts() {
    let store = store(6).await;
    let reranker = StaggeredReranker {
        calls: AtomicUsize::new(0),
        slowest: 500,
    };
    let mut config = config();
    config.run_deadline = Some(Duration::from_millis(50));
    config.failure_policy = FailurePolicy::Skip;

    let err = Benchmark::new(&store, &reranker, config)
        .run(&[0, 1, 2])
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn test_store_timeout_is_per_query() {
    let store = SlowStore {
        inner: store(6).await,
        delay: Duration::from_millis(200),
    };
    let reranker = CountingReranker::default();

    let mut config = config();
    config.store_timeout = Duration::from_millis(20);
    let err = Benchmark::new(&store, &reranker, config.clone())
        .run(&[0])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BenchError::Timeout {
            operation: "fetch_embedding",
            ..
        }
    ));

    config.failure_policy = FailurePolicy::Skip;
    let results = Benchmark::new(&store, &reranker, config)
        .run(&[0, 1])
        .await
        .unwrap();
    assert_eq!(results.skipped.len(), 2);
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_any_query() {
    let store = store(4).await;
    let reranker = CountingReranker::default();
    let mut config = config();
    config.top_k = 0;

    let err = Benchmark::new(&store, &reranker, config)
        .run(&[0])
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::InvalidConfig(_)));
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_from_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conversations.bin");

    let source = store(8).await;
    let snapshot = Snapshot::from_store(&source, TABLE, vec![COLUMN.to_string()])
        .await
        .unwrap();
    save_snapshot(&snapshot, &path).unwrap();

    let offline = load_snapshot(&path).unwrap().into_store().await.unwrap();
    let ids: Vec<DocumentId> = (0..8).collect();
    let reranker = CosineReranker::new();

    let from_file = Benchmark::new(&offline, &reranker, config())
        .run(&ids)
        .await
        .unwrap();
    let direct = Benchmark::new(&source, &reranker, config())
        .run(&ids)
        .await
        .unwrap();

    assert_eq!(from_file.query_ids, direct.query_ids);
    assert_eq!(from_file.ndcg_scores, direct.ndcg_scores);
    assert_eq!(from_file.cosine_sim_scores, direct.cosine_sim_scores);
}
