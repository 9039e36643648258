//! Core data types: stored documents, candidate sets and rerank results.
//!
//! A document is one chunk of conversation text together with any number
//! of named embedding columns, one per embedding strategy.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier of a document row.
pub type DocumentId = i64;

/// One chunk of conversation text and its embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Document {
    /// Unique identifier within a collection.
    pub id: DocumentId,
    /// Raw chunk text.
    pub text: String,
    /// Embedding vectors keyed by column name (e.g. `mpnet_768d`).
    #[serde(default)]
    pub embeddings: HashMap<String, Vec<f32>>,
    /// Conversation this chunk was cut from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Conversation title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Last update of the conversation, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Document {
    /// Create a document with text only.
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            embeddings: HashMap::new(),
            conversation_id: None,
            title: None,
            updated_at: None,
        }
    }

    /// Builder-style helper to attach an embedding column.
    pub fn with_embedding(mut self, column: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(column.into(), vector);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Embedding stored under `column`, if any.
    pub fn embedding(&self, column: &str) -> Option<&[f32]> {
        self.embeddings.get(column).map(Vec::as_slice)
    }
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: DocumentId,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f64,
}

/// Nearest neighbours of a query, sorted by descending similarity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.candidates.iter().map(|c| c.id).collect()
    }

    pub fn similarities(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.similarity).collect()
    }
}

/// One reranked item: where it sat in the candidate set and how relevant it is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    /// Index into the candidate set that was reranked.
    pub index: usize,
    pub relevance_score: f64,
}

/// Candidate indices in relevance order, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    pub hits: Vec<RerankHit>,
}

impl RerankResult {
    pub fn new(hits: Vec<RerankHit>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Original candidate indices in reranked order.
    pub fn indices(&self) -> Vec<usize> {
        self.hits.iter().map(|h| h.index).collect()
    }

    pub fn relevance_scores(&self) -> Vec<f64> {
        self.hits.iter().map(|h| h.relevance_score).collect()
    }

    /// Check that every index is below `candidate_count` and appears once.
    pub fn is_valid_for(&self, candidate_count: usize) -> bool {
        let mut seen = vec![false; candidate_count];
        for hit in &self.hits {
            match seen.get_mut(hit.index) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}
