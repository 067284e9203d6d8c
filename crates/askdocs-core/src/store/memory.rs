//! In-memory [`IndexStore`] and [`Catalog`] for tests and ephemeral runs.
//!
//! Chunks live in a `Vec` behind `std::sync::RwLock`, so insertion order is
//! the vector order. Search is brute-force cosine similarity.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{IndexReadError, IndexWriteError};
use crate::models::{Chunk, DocumentRecord, ScoredChunk};

use super::{rank_top_k, Catalog, IndexStore};

#[derive(Default)]
struct Index {
    chunks: Vec<Chunk>,
    /// Fixed by the first chunk inserted after a clear.
    dims: Option<usize>,
}

/// In-memory store implementing both [`IndexStore`] and [`Catalog`].
#[derive(Default)]
pub struct InMemoryStore {
    index: RwLock<Index>,
    documents: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored chunk, in insertion order.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.index
            .read()
            .map(|index| index.chunks.clone())
            .unwrap_or_default()
    }
}

fn poisoned() -> String {
    "in-memory store lock poisoned".to_string()
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn clear(&self) -> Result<(), IndexWriteError> {
        let mut index = self
            .index
            .write()
            .map_err(|_| IndexWriteError::Clear(poisoned()))?;
        index.chunks.clear();
        index.dims = None;
        Ok(())
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<usize, IndexWriteError> {
        let mut index = self.index.write().map_err(|_| IndexWriteError::Insert {
            document_name: chunks
                .first()
                .map(|c| c.document_name.clone())
                .unwrap_or_default(),
            sequence_index: chunks.first().map(|c| c.sequence_index).unwrap_or(0),
            inserted: 0,
            reason: poisoned(),
        })?;

        for chunk in chunks {
            let expected = *index.dims.get_or_insert(chunk.embedding.len());
            if chunk.embedding.len() != expected {
                return Err(IndexWriteError::DimensionMismatch {
                    document_name: chunk.document_name.clone(),
                    sequence_index: chunk.sequence_index,
                    expected,
                    actual: chunk.embedding.len(),
                });
            }
            index.chunks.push(chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexReadError> {
        let index = self.index.read().map_err(|_| IndexReadError(poisoned()))?;
        if let Some(dims) = index.dims {
            if dims != query.len() {
                return Err(IndexReadError(format!(
                    "query has {} dimensions, index holds {}",
                    query.len(),
                    dims
                )));
            }
        }
        Ok(rank_top_k(query, index.chunks.iter().cloned(), k))
    }

    async fn count(&self) -> Result<usize, IndexReadError> {
        let index = self.index.read().map_err(|_| IndexReadError(poisoned()))?;
        Ok(index.chunks.len())
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn record_document(&self, record: &DocumentRecord) -> Result<(), IndexWriteError> {
        self.documents
            .write()
            .map_err(|_| IndexWriteError::Catalog(poisoned()))?
            .push(record.clone());
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, IndexReadError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| IndexReadError(poisoned()))?;
        Ok(documents.clone())
    }

    async fn clear_documents(&self) -> Result<(), IndexWriteError> {
        self.documents
            .write()
            .map_err(|_| IndexWriteError::Catalog(poisoned()))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(name: &str, idx: usize, embedding: Vec<f32>) -> Chunk {
        Chunk {
            text: format!("{name} chunk {idx}"),
            embedding,
            document_name: name.to_string(),
            source_url: format!("https://example.com/{name}"),
            sequence_index: idx,
        }
    }

    #[tokio::test]
    async fn test_insert_then_search() {
        let store = InMemoryStore::new();
        store
            .insert(&[chunk("a", 0, vec![1.0, 0.0]), chunk("b", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_name, "b");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_index_and_resets_dims() {
        let store = InMemoryStore::new();
        store.insert(&[chunk("a", 0, vec![1.0, 0.0])]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 3).await.unwrap().is_empty());

        store.insert(&[chunk("b", 0, vec![1.0, 0.0, 0.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_keeps_earlier_chunks() {
        let store = InMemoryStore::new();
        let err = store
            .insert(&[chunk("a", 0, vec![1.0, 0.0]), chunk("a", 1, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexWriteError::DimensionMismatch { sequence_index: 1, expected: 2, actual: 1, .. }
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_read_error() {
        let store = InMemoryStore::new();
        store.insert(&[chunk("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_catalog_roundtrip() {
        let store = InMemoryStore::new();
        let record = DocumentRecord {
            name: "guide.pdf".into(),
            source_url: "file:///tmp/guide.pdf".into(),
            blob_key: Some("abc-guide.pdf".into()),
            chunk_count: 4,
            ingested_at: Utc::now(),
        };
        store.record_document(&record).await.unwrap();
        assert_eq!(store.list_documents().await.unwrap(), vec![record]);

        store.clear_documents().await.unwrap();
        assert!(store.list_documents().await.unwrap().is_empty());
    }
}
