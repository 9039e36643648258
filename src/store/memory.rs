//! In-memory vector store using brute-force cosine similarity.
//!
//! Backed by a map guarded by a `tokio::sync::RwLock`. Used for tests and
//! for offline benchmark runs over a snapshot file.

use super::{VectorStore, cosine_similarity, validate_identifier};
use crate::document::{Candidate, CandidateSet, Document, DocumentId};
use crate::error::{BenchError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    /// Ordered by id so ties in similarity resolve to the lowest id.
    documents: BTreeMap<DocumentId, Document>,
    /// Dimensionality fixed by the first vector written to each column.
    dimensions: HashMap<String, usize>,
}

impl Collection {
    /// Column dimensions after accepting `documents`, or the first mismatch.
    ///
    /// Leaves the collection untouched; the caller commits the returned map
    /// only once every document has passed.
    fn dimensions_with<'d>(
        &self,
        documents: impl IntoIterator<Item = &'d Document>,
    ) -> Result<HashMap<String, usize>> {
        let mut dimensions = self.dimensions.clone();
        for doc in documents {
            for (column, vector) in &doc.embeddings {
                let expected = *dimensions.entry(column.clone()).or_insert(vector.len());
                if expected != vector.len() {
                    return Err(BenchError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }
        }
        Ok(dimensions)
    }
}

/// An in-memory [`VectorStore`].
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `documents` in `collection`.
    pub async fn from_documents(collection: &str, documents: &[Document]) -> Result<Self> {
        let store = Self::new();
        store.upsert_documents(collection, documents).await?;
        Ok(store)
    }

    /// Number of documents in a collection (0 if it does not exist).
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    fn missing_collection(collection: &str) -> BenchError {
        BenchError::Query(format!("collection '{}' does not exist", collection))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn fetch_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
    ) -> Result<Vec<f32>> {
        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| Self::missing_collection(collection))?;

        store
            .documents
            .get(&id)
            .and_then(|doc| doc.embedding(column))
            .map(<[f32]>::to_vec)
            .ok_or_else(|| BenchError::NotFound {
                collection: collection.to_string(),
                column: column.to_string(),
                id,
            })
    }

    async fn similarity_search(
        &self,
        collection: &str,
        column: &str,
        query: &[f32],
        k: usize,
        exclude: Option<DocumentId>,
    ) -> Result<CandidateSet> {
        if k == 0 {
            return Err(BenchError::InvalidInput(
                "similarity search needs k >= 1".to_string(),
            ));
        }

        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| Self::missing_collection(collection))?;

        if let Some(&expected) = store.dimensions.get(column) {
            if expected != query.len() {
                return Err(BenchError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<Candidate> = store
            .documents
            .values()
            .filter(|doc| Some(doc.id) != exclude)
            .filter_map(|doc| {
                doc.embedding(column).map(|embedding| Candidate {
                    id: doc.id,
                    similarity: cosine_similarity(query, embedding),
                })
            })
            .collect();

        // Stable sort keeps ascending id order among equal scores.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(CandidateSet::new(scored))
    }

    async fn upsert_document(&self, collection: &str, document: &Document) -> Result<()> {
        self.upsert_documents(collection, std::slice::from_ref(document))
            .await
    }

    async fn upsert_documents(&self, collection: &str, documents: &[Document]) -> Result<()> {
        validate_identifier(collection)?;
        for doc in documents {
            for column in doc.embeddings.keys() {
                validate_identifier(column)?;
            }
        }

        let mut collections = self.collections.write().await;
        let dimensions = match collections.get(collection) {
            Some(store) => store.dimensions_with(documents)?,
            None => Collection::default().dimensions_with(documents)?,
        };

        let store = collections.entry(collection.to_string()).or_default();
        store.dimensions = dimensions;
        for doc in documents {
            store.documents.insert(doc.id, doc.clone());
        }
        Ok(())
    }

    async fn upsert_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
        vector: &[f32],
    ) -> Result<()> {
        validate_identifier(column)?;

        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing_collection(collection))?;

        if !store.documents.contains_key(&id) {
            return Err(BenchError::NotFound {
                collection: collection.to_string(),
                column: column.to_string(),
                id,
            });
        }
        let expected = store
            .dimensions
            .get(column)
            .copied()
            .unwrap_or(vector.len());
        if expected != vector.len() {
            return Err(BenchError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        store.dimensions.insert(column.to_string(), expected);
        if let Some(doc) = store.documents.get_mut(&id) {
            doc.embeddings.insert(column.to_string(), vector.to_vec());
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str, columns: &[String]) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| Self::missing_collection(collection))?;

        let documents = store
            .documents
            .values()
            .map(|doc| {
                let mut doc = doc.clone();
                if !columns.is_empty() {
                    doc.embeddings.retain(|name, _| columns.contains(name));
                }
                doc
            })
            .collect();
        Ok(documents)
    }
}
