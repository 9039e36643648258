//! Rerank Bench - compare embedding strategies for conversation search.
//!
//! Chat transcripts are chunked into documents and embedded with several
//! models, one vector column per model. This library measures how well
//! plain vector retrieval over one of those columns agrees with a
//! cross-encoder reranker.
//!
//! # Overview
//!
//! For every query document the benchmark:
//! 1. Fetches the document's embedding and retrieves its nearest neighbours
//! 2. Asks a reranking oracle to reorder the neighbours
//! 3. Records the mean cosine similarity, the mean top-K relevance and the
//!    NDCG agreement between the two orderings
//!
//! # Quick Start
//!
//! ```no_run
//! use rerank_bench::{
//!     config::Config,
//!     eval::{Benchmark, BenchmarkConfig},
//!     rerank::CohereReranker,
//!     store::PgVectorStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate_database()?;
//!     config.validate_rerank()?;
//!
//!     let store = PgVectorStore::connect(&config.database).await?;
//!     let reranker = CohereReranker::new(config.rerank.clone())?;
//!
//!     let bench_config = BenchmarkConfig::new("conversations_chunk2034char", "mpnet_768d");
//!     let ids: Vec<i64> = (0..10).collect();
//!     let results = Benchmark::new(&store, &reranker, bench_config).run(&ids).await?;
//!
//!     println!("avg ndcg: {}", results.avg_ndcg_score());
//!     store.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **VectorStore**: pgvector or in-memory store of documents and embeddings
//! - **Reranker**: HTTP (Cohere-compatible) or local cosine oracle
//! - **Benchmark**: the retrieve / rerank / score loop
//! - **Snapshot**: file dump of a table for offline runs

pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod persistence;
pub mod rerank;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use document::{Candidate, CandidateSet, Document, DocumentId, RerankHit, RerankResult};
pub use error::{BenchError, Result};
pub use eval::{Benchmark, BenchmarkConfig, BenchmarkResults, FailurePolicy, RunReport};
pub use persistence::{Snapshot, load_snapshot, save_snapshot};
pub use rerank::{CohereReranker, CosineReranker, RerankDocument, Reranker};
pub use store::{InMemoryVectorStore, PgVectorStore, VectorStore};
