//! Error types for the rerank benchmark.

use crate::document::DocumentId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while running a benchmark.
#[derive(Error, Debug)]
pub enum BenchError {
    /// The requested document (or its embedding column) is absent from the store.
    #[error("Document {id} not found in '{collection}' (column '{column}')")]
    NotFound {
        collection: String,
        column: String,
        id: DocumentId,
    },

    /// Store connectivity or SQL failure.
    #[error("Vector store query failed: {0}")]
    Query(String),

    /// A single store call took longer than its timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The whole run took longer than its deadline.
    #[error("Benchmark run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Reranking service failed for a transient reason (network, 5xx, rate limit).
    #[error("Reranking oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Reranking service rejected our credentials.
    #[error("Reranking oracle rejected credentials: {0}")]
    OracleAuth(String),

    /// Reranking service answered with something we cannot use.
    #[error("Invalid reranking oracle response: {0}")]
    OracleResponse(String),

    /// Similarity search returned no neighbours for a query document.
    #[error("No candidates found for query document {0}")]
    EmptyCandidateSet(DocumentId),

    /// A vector does not match the dimensionality of its column.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller supplied an argument outside the contract.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same oracle call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OracleUnavailable(_) | Self::Timeout { .. })
    }

    /// Whether the failure is confined to a single query, so a run may
    /// skip that query and carry on. Auth, configuration and deadline
    /// failures would hit every remaining query and are never skippable.
    pub fn is_query_local(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::EmptyCandidateSet(_)
                | Self::OracleUnavailable(_)
                | Self::OracleResponse(_)
                | Self::Timeout { .. }
                | Self::DimensionMismatch { .. }
        )
    }
}

impl From<sqlx::Error> for BenchError {
    fn from(err: sqlx::Error) -> Self {
        BenchError::Query(err.to_string())
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            BenchError::OracleUnavailable(err.to_string())
        } else {
            BenchError::OracleResponse(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}
