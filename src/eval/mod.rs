//! Evaluation of embedding columns against a reranking oracle.
//!
//! This module provides:
//! - The benchmark runner (retrieve, rerank, score)
//! - Ranking metrics (mean, top-K mean, NDCG)
//! - Run reports written to disk

pub mod benchmark;
pub mod metrics;
pub mod report;

pub use benchmark::{
    Benchmark, BenchmarkConfig, BenchmarkResults, FailurePolicy, QueryScores, SkippedQuery,
    score_query,
};
pub use metrics::{dcg_at_k, mean, ndcg_at_k, rerank_agreement, top_k_mean};
pub use report::{RunParams, RunReport, RunSummary};
