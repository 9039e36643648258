//! Benchmark runner comparing vector retrieval against a reranking oracle.
//!
//! For every query document the runner retrieves its nearest neighbours,
//! asks the oracle to rerank them, and records three scores: the mean
//! cosine similarity of the neighbours, the mean relevance of the oracle's
//! top-K, and the NDCG agreement between the two orderings.

use super::metrics::{mean, rerank_agreement, top_k_mean};
use crate::document::{CandidateSet, DocumentId, RerankResult};
use crate::error::{BenchError, Result};
use crate::rerank::{RerankDocument, Reranker};
use crate::store::VectorStore;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What to do when one query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run and return the error; no results are produced.
    #[default]
    Abort,
    /// Log the failure, record the id as skipped and continue. Failures
    /// that would affect every query (auth, config, deadline) still abort.
    Skip,
}

/// Configuration for the benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Table holding the documents.
    pub collection: String,
    /// Embedding column under test.
    pub column: String,
    /// Number of neighbours to retrieve per query (N).
    pub candidate_count: usize,
    /// Number of reranked results that count towards the rerank score and NDCG cutoff (K).
    pub top_k: usize,
    /// Handling of per-query failures.
    pub failure_policy: FailurePolicy,
    /// Queries evaluated at once; 1 runs strictly sequentially.
    pub concurrency: usize,
    /// Timeout applied to each vector store call.
    pub store_timeout: Duration,
    /// Deadline for the whole run.
    pub run_deadline: Option<Duration>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            collection: "conversations".to_string(),
            column: String::new(),
            candidate_count: 10,
            top_k: 3,
            failure_policy: FailurePolicy::Abort,
            concurrency: 1,
            store_timeout: Duration::from_secs(30),
            run_deadline: None,
        }
    }
}

impl BenchmarkConfig {
    /// Create a config for one table and embedding column.
    pub fn new(collection: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            column: column.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        crate::store::validate_identifier(&self.collection)?;
        crate::store::validate_identifier(&self.column)?;
        if self.candidate_count == 0 {
            return Err(BenchError::InvalidConfig(
                "candidate count must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(BenchError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scores for a single query document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryScores {
    pub id: DocumentId,
    /// Mean cosine similarity of the retrieved candidates.
    pub cosine_sim_score: f64,
    /// Mean relevance of the reranker's top-K.
    pub rerank_score: f64,
    /// NDCG@K agreement between retrieval and rerank order.
    pub ndcg_score: f64,
    /// Number of candidates actually retrieved.
    pub candidates: usize,
}

/// A query left out under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedQuery {
    pub id: DocumentId,
    pub error: String,
}

/// Aggregated benchmark results, one entry per processed query in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub query_ids: Vec<DocumentId>,
    pub rerank_scores: Vec<f64>,
    pub ndcg_scores: Vec<f64>,
    pub cosine_sim_scores: Vec<f64>,
    #[serde(default)]
    pub skipped: Vec<SkippedQuery>,
    /// Total benchmark time (seconds).
    pub total_time_secs: f64,
}

impl BenchmarkResults {
    /// Create empty results.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, scores: QueryScores) {
        self.query_ids.push(scores.id);
        self.rerank_scores.push(scores.rerank_score);
        self.ndcg_scores.push(scores.ndcg_score);
        self.cosine_sim_scores.push(scores.cosine_sim_score);
    }

    /// Number of queries that produced scores.
    pub fn len(&self) -> usize {
        self.query_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_ids.is_empty()
    }

    /// Mean of the rerank scores (`NaN` if empty).
    pub fn avg_rerank_score(&self) -> f64 {
        mean(&self.rerank_scores)
    }

    /// Mean of the NDCG scores (`NaN` if empty).
    pub fn avg_ndcg_score(&self) -> f64 {
        mean(&self.ndcg_scores)
    }

    /// Mean of the cosine similarity scores (`NaN` if empty).
    pub fn avg_cosine_sim_score(&self) -> f64 {
        mean(&self.cosine_sim_scores)
    }
}

/// Score one query from its candidates and the oracle's verdict.
pub fn score_query(
    id: DocumentId,
    candidates: &CandidateSet,
    rerank: &RerankResult,
    top_k: usize,
) -> QueryScores {
    QueryScores {
        id,
        cosine_sim_score: mean(&candidates.similarities()),
        rerank_score: top_k_mean(&rerank.relevance_scores(), top_k),
        ndcg_score: rerank_agreement(rerank, top_k),
        candidates: candidates.len(),
    }
}

/// Benchmark runner.
///
/// Borrows the store and reranker for the duration of a run; neither holds
/// mutable state, so concurrent queries can share them.
pub struct Benchmark<'a, S: ?Sized, R: ?Sized> {
    store: &'a S,
    reranker: &'a R,
    config: BenchmarkConfig,
}

impl<'a, S, R> Benchmark<'a, S, R>
where
    S: VectorStore + ?Sized,
    R: Reranker + ?Sized,
{
    /// Create a new benchmark runner.
    pub fn new(store: &'a S, reranker: &'a R, config: BenchmarkConfig) -> Self {
        Self {
            store,
            reranker,
            config,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the benchmark over `ids`, honouring the run deadline.
    pub async fn run(&self, ids: &[DocumentId]) -> Result<BenchmarkResults> {
        self.config.validate()?;

        info!(
            collection = %self.config.collection,
            column = %self.config.column,
            reranker = self.reranker.name(),
            queries = ids.len(),
            candidates = self.config.candidate_count,
            top_k = self.config.top_k,
            "starting benchmark run"
        );

        match self.config.run_deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_queries(ids))
                .await
                .map_err(|_| BenchError::DeadlineExceeded(deadline))?,
            None => self.run_queries(ids).await,
        }
    }

    async fn run_queries(&self, ids: &[DocumentId]) -> Result<BenchmarkResults> {
        let start_time = Instant::now();
        let mut results = BenchmarkResults::new();

        // buffered() yields in input order, so results stay aligned with `ids`
        let mut outcomes = pin!(
            futures::stream::iter(ids.iter().copied())
                .map(|id| async move { (id, self.evaluate_query(id).await) })
                .buffered(self.config.concurrency)
        );

        while let Some((id, outcome)) = outcomes.next().await {
            match outcome {
                Ok(scores) => {
                    debug!(
                        id,
                        cosine = scores.cosine_sim_score,
                        rerank = scores.rerank_score,
                        ndcg = scores.ndcg_score,
                        "scored query"
                    );
                    results.push(scores);
                }
                Err(err)
                    if self.config.failure_policy == FailurePolicy::Skip
                        && err.is_query_local() =>
                {
                    warn!(id, error = %err, "skipping query");
                    results.skipped.push(SkippedQuery {
                        id,
                        error: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(id, error = %err, "aborting benchmark run");
                    return Err(err);
                }
            }
        }

        results.total_time_secs = start_time.elapsed().as_secs_f64();
        info!(
            scored = results.len(),
            skipped = results.skipped.len(),
            secs = results.total_time_secs,
            "benchmark run finished"
        );
        Ok(results)
    }

    /// Retrieve, rerank and score a single query document.
    pub async fn evaluate_query(&self, id: DocumentId) -> Result<QueryScores> {
        let collection = self.config.collection.as_str();
        let column = self.config.column.as_str();

        let query = self
            .with_timeout(
                "fetch_embedding",
                self.store.fetch_embedding(collection, column, id),
            )
            .await?;

        let candidates = self
            .with_timeout(
                "similarity_search",
                self.store.similarity_search(
                    collection,
                    column,
                    &query,
                    self.config.candidate_count,
                    Some(id),
                ),
            )
            .await?;

        if candidates.is_empty() {
            return Err(BenchError::EmptyCandidateSet(id));
        }

        let candidate_ids = candidates.ids();
        let vectors = self
            .with_timeout(
                "fetch_embeddings",
                self.store.fetch_embeddings(collection, column, &candidate_ids),
            )
            .await?;

        let documents: Vec<RerankDocument> =
            vectors.into_iter().map(RerankDocument::Embedding).collect();
        let rerank = self
            .reranker
            .rerank(
                &RerankDocument::Embedding(query),
                &documents,
                documents.len(),
            )
            .await?;

        if rerank.len() != documents.len() || !rerank.is_valid_for(documents.len()) {
            return Err(BenchError::OracleResponse(format!(
                "{} returned {} hits for {} candidates",
                self.reranker.name(),
                rerank.len(),
                documents.len()
            )));
        }

        Ok(score_query(id, &candidates, &rerank, self.config.top_k))
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let after = self.config.store_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| BenchError::Timeout { operation, after })?
    }
}
