//! pgvector (PostgreSQL) vector store backend.
//!
//! Expects tables shaped like the conversation chunk tables:
//!
//! ```sql
//! CREATE TABLE conversations_chunk2034char (
//!     id BIGSERIAL PRIMARY KEY,
//!     title TEXT,
//!     update_time TIMESTAMP,
//!     messages TEXT,
//!     conversation_id TEXT,
//!     mpnet_768d vector(768)   -- one column per embedding strategy
//! );
//! ```
//!
//! Schema changes are out of scope: the table and its vector columns must
//! already exist. Vectors are exchanged as pgvector text literals.

use super::{VectorStore, parse_vector_literal, validate_identifier, vector_literal};
use crate::config::DatabaseConfig;
use crate::document::{Candidate, CandidateSet, Document, DocumentId};
use crate::error::{BenchError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

/// A [`VectorStore`] backed by PostgreSQL with the pgvector extension.
///
/// Owns its connection pool; call [`PgVectorStore::close`] when the run ends.
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    /// Connect using the database section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.query_timeout())
            .connect(&config.url)
            .await?;
        debug!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("closed postgres pool");
    }

    /// Upsert the row, then set each of its embedding columns.
    async fn write_document(
        conn: &mut PgConnection,
        collection: &str,
        document: &Document,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {collection} (id, messages, title, conversation_id, update_time) \
             VALUES ($1, $2, $3, $4, to_timestamp($5)::TIMESTAMP) \
             ON CONFLICT (id) DO UPDATE SET \
                messages = EXCLUDED.messages, \
                title = EXCLUDED.title, \
                conversation_id = EXCLUDED.conversation_id, \
                update_time = EXCLUDED.update_time"
        );

        sqlx::query(&sql)
            .bind(document.id)
            .bind(&document.text)
            .bind(&document.title)
            .bind(&document.conversation_id)
            .bind(document.updated_at.map(|t| t as f64))
            .execute(&mut *conn)
            .await?;

        for (column, vector) in &document.embeddings {
            Self::write_embedding(&mut *conn, collection, column, document.id, vector).await?;
        }
        Ok(())
    }

    async fn write_embedding(
        conn: &mut PgConnection,
        collection: &str,
        column: &str,
        id: DocumentId,
        vector: &[f32],
    ) -> Result<()> {
        validate_identifier(column)?;

        let sql = format!("UPDATE {collection} SET {column} = $1::vector WHERE id = $2");
        let result = sqlx::query(&sql)
            .bind(vector_literal(vector))
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BenchError::NotFound {
                collection: collection.to_string(),
                column: column.to_string(),
                id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn fetch_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
    ) -> Result<Vec<f32>> {
        validate_identifier(collection)?;
        validate_identifier(column)?;

        let sql = format!("SELECT {column}::TEXT AS embedding FROM {collection} WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let embedding: Option<String> = match row {
            Some(row) => row.try_get("embedding")?,
            None => None,
        };

        match embedding {
            Some(text) => parse_vector_literal(&text),
            None => Err(BenchError::NotFound {
                collection: collection.to_string(),
                column: column.to_string(),
                id,
            }),
        }
    }

    async fn similarity_search(
        &self,
        collection: &str,
        column: &str,
        query: &[f32],
        k: usize,
        exclude: Option<DocumentId>,
    ) -> Result<CandidateSet> {
        validate_identifier(collection)?;
        validate_identifier(column)?;
        if k == 0 {
            return Err(BenchError::InvalidInput(
                "similarity search needs k >= 1".to_string(),
            ));
        }

        // <=> is cosine distance, so similarity = 1 - distance
        let sql = format!(
            "SELECT id::BIGINT AS id, 1 - ({column} <=> $1::vector) AS cosine_sim \
             FROM {collection} \
             WHERE {column} IS NOT NULL AND ($2::BIGINT IS NULL OR id <> $2) \
             ORDER BY {column} <=> $1::vector \
             LIMIT $3"
        );

        let rows = sqlx::query(&sql)
            .bind(vector_literal(query))
            .bind(exclude)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                Ok(Candidate {
                    id: row.try_get("id")?,
                    similarity: row.try_get("cosine_sim")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        debug!(collection, column, k, found = candidates.len(), "similarity search");
        Ok(CandidateSet::new(candidates))
    }

    async fn upsert_document(&self, collection: &str, document: &Document) -> Result<()> {
        self.upsert_documents(collection, std::slice::from_ref(document))
            .await
    }

    /// Writes every document in one transaction; on error it is rolled back.
    async fn upsert_documents(&self, collection: &str, documents: &[Document]) -> Result<()> {
        validate_identifier(collection)?;

        let mut tx = self.pool.begin().await?;
        for document in documents {
            Self::write_document(&mut *tx, collection, document).await?;
        }
        tx.commit().await?;

        debug!(collection, count = documents.len(), "upserted documents");
        Ok(())
    }

    async fn upsert_embedding(
        &self,
        collection: &str,
        column: &str,
        id: DocumentId,
        vector: &[f32],
    ) -> Result<()> {
        validate_identifier(collection)?;

        let mut conn = self.pool.acquire().await?;
        Self::write_embedding(&mut *conn, collection, column, id, vector).await
    }

    async fn list_documents(&self, collection: &str, columns: &[String]) -> Result<Vec<Document>> {
        validate_identifier(collection)?;
        for column in columns {
            validate_identifier(column)?;
        }

        let vector_select: String = columns
            .iter()
            .map(|c| format!(", {c}::TEXT AS {c}"))
            .collect();
        let sql = format!(
            "SELECT id::BIGINT AS id, messages, title, conversation_id::TEXT AS conversation_id, \
                    EXTRACT(EPOCH FROM update_time)::BIGINT AS updated_at{vector_select} \
             FROM {collection} ORDER BY id"
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let text: Option<String> = row.try_get("messages")?;
            let mut doc = Document::new(row.try_get("id")?, text.unwrap_or_default());
            doc.title = row.try_get("title")?;
            doc.conversation_id = row.try_get("conversation_id")?;
            doc.updated_at = row.try_get("updated_at")?;

            for column in columns {
                let literal: Option<String> = row.try_get(column.as_str())?;
                if let Some(literal) = literal {
                    doc.embeddings
                        .insert(column.clone(), parse_vector_literal(&literal)?);
                }
            }
            documents.push(doc);
        }

        debug!(collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
