//! SQLite-backed [`IndexStore`] and [`Catalog`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the chunk text.
//! Search loads every row in rowid order and ranks in process with
//! [`rank_top_k`], which is what keeps score ties in insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use askdocs_core::embedding::{blob_to_vec, vec_to_blob};
use askdocs_core::error::{IndexReadError, IndexWriteError};
use askdocs_core::models::{Chunk, DocumentRecord, ScoredChunk};
use askdocs_core::store::{rank_top_k, Catalog, IndexStore};

/// SQLite implementation of the index and the document catalog.
///
/// Wraps a connection pool; cloning is cheap.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Expects the schema from [`crate::migrate::migrate`] to exist.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn stored_dims(&self) -> Result<Option<usize>, sqlx::Error> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM chunks ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn clear(&self) -> Result<(), IndexWriteError> {
        sqlx::query("DELETE FROM chunks")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexWriteError::Clear(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<usize, IndexWriteError> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };

        let mut expected = self
            .stored_dims()
            .await
            .map_err(|e| IndexWriteError::Insert {
                document_name: first.document_name.clone(),
                sequence_index: first.sequence_index,
                inserted: 0,
                reason: e.to_string(),
            })?;

        for (inserted, chunk) in chunks.iter().enumerate() {
            let dims = *expected.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != dims {
                return Err(IndexWriteError::DimensionMismatch {
                    document_name: chunk.document_name.clone(),
                    sequence_index: chunk.sequence_index,
                    expected: dims,
                    actual: chunk.embedding.len(),
                });
            }

            sqlx::query(
                r#"
                INSERT INTO chunks (document_name, source_url, sequence_index, text, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.document_name)
            .bind(&chunk.source_url)
            .bind(chunk.sequence_index as i64)
            .bind(&chunk.text)
            .bind(dims as i64)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&self.pool)
            .await
            .map_err(|e| IndexWriteError::Insert {
                document_name: chunk.document_name.clone(),
                sequence_index: chunk.sequence_index,
                inserted,
                reason: e.to_string(),
            })?;
        }

        Ok(chunks.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexReadError> {
        let rows = sqlx::query(
            r#"
            SELECT document_name, source_url, sequence_index, text, dims, embedding
            FROM chunks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexReadError(e.to_string()))?;

        if let Some(row) = rows.first() {
            let dims: i64 = row.get("dims");
            if dims as usize != query.len() {
                return Err(IndexReadError(format!(
                    "query has {} dimensions, index holds {}",
                    query.len(),
                    dims
                )));
            }
        }

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let sequence_index: i64 = row.get("sequence_index");
            Chunk {
                text: row.get("text"),
                embedding: blob_to_vec(&blob),
                document_name: row.get("document_name"),
                source_url: row.get("source_url"),
                sequence_index: sequence_index as usize,
            }
        });

        Ok(rank_top_k(query, candidates, k))
    }

    async fn count(&self) -> Result<usize, IndexReadError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexReadError(e.to_string()))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl Catalog for SqliteStore {
    async fn record_document(&self, record: &DocumentRecord) -> Result<(), IndexWriteError> {
        sqlx::query(
            r#"
            INSERT INTO documents (name, source_url, blob_key, chunk_count, ingested_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.name)
        .bind(&record.source_url)
        .bind(&record.blob_key)
        .bind(record.chunk_count as i64)
        .bind(record.ingested_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexWriteError::Catalog(e.to_string()))?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, IndexReadError> {
        let rows = sqlx::query(
            r#"
            SELECT name, source_url, blob_key, chunk_count, ingested_at
            FROM documents
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexReadError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let ingested_at: String = row.get("ingested_at");
                let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
                    .map_err(|e| IndexReadError(format!("bad ingested_at '{ingested_at}': {e}")))?
                    .with_timezone(&Utc);
                let chunk_count: i64 = row.get("chunk_count");
                Ok(DocumentRecord {
                    name: row.get("name"),
                    source_url: row.get("source_url"),
                    blob_key: row.get("blob_key"),
                    chunk_count: chunk_count as usize,
                    ingested_at,
                })
            })
            .collect()
    }

    async fn clear_documents(&self) -> Result<(), IndexWriteError> {
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexWriteError::Catalog(e.to_string()))?;
        Ok(())
    }
}
