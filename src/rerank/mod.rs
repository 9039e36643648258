//! Reranking oracles.
//!
//! A reranker takes a query and an ordered list of candidate documents and
//! returns the candidates' indices in relevance order with a score each.
//! Documents are either text or raw embedding vectors; the benchmark hands
//! the oracle embeddings, exactly as the vector store returns them.

mod cohere;
mod cosine;

pub use cohere::CohereReranker;
pub use cosine::CosineReranker;

use crate::document::RerankResult;
use crate::error::{BenchError, Result};
use crate::store::vector_literal;
use async_trait::async_trait;

/// Something the oracle can score: text or a raw embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum RerankDocument {
    Text(String),
    Embedding(Vec<f32>),
}

impl RerankDocument {
    /// Textual payload sent to a text-only API. Embeddings use their
    /// pgvector literal form.
    pub fn to_payload(&self) -> String {
        match self {
            RerankDocument::Text(text) => text.clone(),
            RerankDocument::Embedding(vector) => vector_literal(vector),
        }
    }

    pub fn as_embedding(&self) -> Option<&[f32]> {
        match self {
            RerankDocument::Embedding(vector) => Some(vector),
            RerankDocument::Text(_) => None,
        }
    }
}

impl From<Vec<f32>> for RerankDocument {
    fn from(vector: Vec<f32>) -> Self {
        RerankDocument::Embedding(vector)
    }
}

impl From<String> for RerankDocument {
    fn from(text: String) -> Self {
        RerankDocument::Text(text)
    }
}

/// A relevance model that reorders candidates for a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `documents` against `query`, keeping the `top_n` most relevant.
    ///
    /// Returned hits reference positions in `documents` and are sorted by
    /// descending relevance.
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult>;

    /// Short name for logs and reports.
    fn name(&self) -> &str;
}

/// Enforce the common argument contract shared by every reranker.
pub(crate) fn check_rerank_args(documents: &[RerankDocument], top_n: usize) -> Result<()> {
    if documents.is_empty() {
        return Err(BenchError::InvalidInput(
            "rerank needs at least one document".to_string(),
        ));
    }
    if top_n == 0 || top_n > documents.len() {
        return Err(BenchError::InvalidInput(format!(
            "top_n must be in 1..={}, got {}",
            documents.len(),
            top_n
        )));
    }
    Ok(())
}
