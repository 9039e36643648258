//! Snapshot files: a collection of documents with their embeddings.
//!
//! Lets a benchmark run against an in-memory store without a database.
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.

use crate::document::Document;
use crate::error::{BenchError, Result};
use crate::store::{InMemoryVectorStore, VectorStore};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Save format for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json, // Default to JSON
        }
    }
}

/// The rows of one table, with the embedding columns that were exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Snapshot {
    /// Table the rows came from.
    pub collection: String,
    /// Embedding columns present in the snapshot.
    pub columns: Vec<String>,
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn new(collection: impl Into<String>, columns: Vec<String>, documents: Vec<Document>) -> Self {
        Self {
            collection: collection.into(),
            columns,
            documents,
        }
    }

    /// Read every document of `collection` out of a store.
    pub async fn from_store<S: VectorStore + ?Sized>(
        store: &S,
        collection: &str,
        columns: Vec<String>,
    ) -> Result<Self> {
        let documents = store.list_documents(collection, &columns).await?;
        Ok(Self::new(collection, columns, documents))
    }

    /// Load the snapshot into a fresh in-memory store.
    pub async fn into_store(self) -> Result<InMemoryVectorStore> {
        InMemoryVectorStore::from_documents(&self.collection, &self.documents).await
    }

    /// Write every document into `collection` of another store, as a
    /// single batch.
    pub async fn import_into<S: VectorStore + ?Sized>(&self, store: &S, collection: &str) -> Result<usize> {
        store.upsert_documents(collection, &self.documents).await?;
        Ok(self.documents.len())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Save a snapshot to a file, picking the format from the extension.
pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let format = SaveFormat::from_path(path);
    save_snapshot_with_format(snapshot, path, format)
}

/// Save a snapshot with specific format.
pub fn save_snapshot_with_format(snapshot: &Snapshot, path: &Path, format: SaveFormat) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(snapshot)
            .map_err(|e| BenchError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(snapshot, config)
                .map_err(|e| BenchError::Serialization(e.to_string()))?
        }
    };

    fs::write(path, &data).map_err(|e| BenchError::io(path, e))?;

    Ok(())
}

/// Load a snapshot from a file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(BenchError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "snapshot file not found"),
        ));
    }

    let format = SaveFormat::from_path(path);
    load_snapshot_with_format(path, format)
}

/// Load a snapshot with specific format.
pub fn load_snapshot_with_format(path: &Path, format: SaveFormat) -> Result<Snapshot> {
    let data = fs::read(path).map_err(|e| BenchError::io(path, e))?;

    let snapshot = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| BenchError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (snapshot, _): (Snapshot, usize) = bincode::decode_from_slice(&data, config)
                .map_err(|e| BenchError::Serialization(e.to_string()))?;
            snapshot
        }
    };

    Ok(snapshot)
}
