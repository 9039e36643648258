//! Vector store adapters.
//!
//! A store holds collections (tables) of [`Document`]s, each carrying one
//! or more named embedding columns. The benchmark only reads from it; the
//! write side exists for snapshot import and tests.

mod memory;
mod pgvector;

pub use memory::InMemoryVectorStore;
pub use pgvector::PgVectorStore;

use crate::document::{CandidateSet, Document, DocumentId};
use crate::error::{BenchError, Result};
use async_trait::async_trait;

/// A persisted collection of (identifier, vector) pairs with similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fetch the vector stored under `column` for document `id`.
    ///
    /// Fails with [`BenchError::NotFound`] when the row is absent or the
    /// column is NULL for that row.
    async fn fetch_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
    ) -> Result<Vec<f32>>;

    /// Return up to `k` nearest neighbours of `query` by cosine similarity,
    /// most similar first, never including `exclude`.
    async fn similarity_search(
        &self,
        collection: &str,
        column: &str,
        query: &[f32],
        k: usize,
        exclude: Option<DocumentId>,
    ) -> Result<CandidateSet>;

    /// Insert or replace a document together with all of its embeddings.
    ///
    /// On error nothing of the document is written.
    async fn upsert_document(&self, collection: &str, document: &Document) -> Result<()>;

    /// Insert or replace several documents. Backends that can write them
    /// atomically do so; the default writes one document at a time.
    async fn upsert_documents(&self, collection: &str, documents: &[Document]) -> Result<()> {
        for document in documents {
            self.upsert_document(collection, document).await?;
        }
        Ok(())
    }

    /// Set one embedding column of an existing document.
    async fn upsert_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
        vector: &[f32],
    ) -> Result<()>;

    /// All documents of a collection in id order, with the requested columns.
    async fn list_documents(&self, collection: &str, columns: &[String]) -> Result<Vec<Document>>;

    /// Fetch several vectors, in the order of `ids`.
    async fn fetch_embeddings(
        &self,
        collection: &str,
        column: &str,
        ids: &[DocumentId],
    ) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(ids.len());
        for &id in ids {
            vectors.push(self.fetch_embedding(collection, column, id).await?);
        }
        Ok(vectors)
    }

    /// Cheap round trip to verify the store is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Reject names that cannot be used verbatim as SQL identifiers.
///
/// Table and column names are interpolated into queries, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(BenchError::InvalidInput(format!(
            "'{}' is not a valid table or column name",
            name
        )))
    }
}

/// Render a vector as a pgvector text literal, e.g. `[0.1,0.2]`.
pub fn vector_literal(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

/// Parse a pgvector text literal back into a vector.
pub fn parse_vector_literal(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| BenchError::Serialization(format!("Not a vector literal: '{}'", text)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| BenchError::Serialization(format!("Bad vector element '{}': {}", v, e)))
        })
        .collect()
}

/// Cosine similarity between two vectors, 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
