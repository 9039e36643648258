//! Local reranker scoring embeddings by cosine similarity to the query.
//!
//! Needs no network and is fully deterministic, which makes it useful for
//! offline runs and as a sanity baseline: against the store's own cosine
//! ranking it should agree perfectly.

use super::{RerankDocument, Reranker, check_rerank_args};
use crate::document::{RerankHit, RerankResult};
use crate::error::{BenchError, Result};
use crate::store::cosine_similarity;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct CosineReranker;

impl CosineReranker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reranker for CosineReranker {
    async fn rerank(
        &self,
        query: &RerankDocument,
        documents: &[RerankDocument],
        top_n: usize,
    ) -> Result<RerankResult> {
        check_rerank_args(documents, top_n)?;

        let query = query.as_embedding().ok_or_else(|| {
            BenchError::InvalidInput("cosine reranker only scores embeddings".to_string())
        })?;

        let mut hits = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                let embedding = doc.as_embedding().ok_or_else(|| {
                    BenchError::InvalidInput("cosine reranker only scores embeddings".to_string())
                })?;
                Ok(RerankHit {
                    index,
                    relevance_score: cosine_similarity(query, embedding),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_n);

        Ok(RerankResult::new(hits))
    }

    fn name(&self) -> &str {
        "cosine"
    }
}
