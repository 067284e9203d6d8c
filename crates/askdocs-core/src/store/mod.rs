//! Storage abstraction for askdocs.
//!
//! [`IndexStore`] holds the embedded chunks that retrieval ranks, and
//! [`Catalog`] holds the per-document listing shown to users. Both are
//! replaced wholesale on every ingestion batch.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{IndexReadError, IndexWriteError};
use crate::models::{Chunk, DocumentRecord, ScoredChunk};

/// Vector index over embedded chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`clear`](IndexStore::clear) | Remove every chunk |
/// | [`insert`](IndexStore::insert) | Append chunks in order |
/// | [`search`](IndexStore::search) | Top-k chunks by cosine similarity |
/// | [`count`](IndexStore::count) | Number of stored chunks |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Remove every chunk. After success the index is empty.
    async fn clear(&self) -> Result<(), IndexWriteError>;

    /// Append chunks, preserving their order.
    ///
    /// Returns the number of chunks written. Writes are not transactional:
    /// when an error is returned, the chunks before the failing one remain
    /// stored and [`IndexWriteError::Insert`] reports how many.
    async fn insert(&self, chunks: &[Chunk]) -> Result<usize, IndexWriteError>;

    /// Return up to `k` chunks by descending cosine similarity to `query`.
    ///
    /// Equal scores keep insertion order.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexReadError>;

    async fn count(&self) -> Result<usize, IndexReadError>;
}

/// Listing of ingested documents.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Add one document row.
    async fn record_document(&self, record: &DocumentRecord) -> Result<(), IndexWriteError>;

    /// All rows in ingestion order.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, IndexReadError>;

    async fn clear_documents(&self) -> Result<(), IndexWriteError>;
}

/// Score `candidates` against `query` and keep the best `k`.
///
/// Candidates must be supplied in insertion order; the sort is stable, so
/// ties resolve to the earlier-inserted chunk.
pub fn rank_top_k<I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = Chunk>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query, &chunk.embedding);
            ScoredChunk { chunk, score }
        })
        .collect();

    // NaN scores rank below every real score.
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    scored.sort_by(|a, b| key(b.score).total_cmp(&key(a.score)));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, idx: usize, embedding: Vec<f32>) -> Chunk {
        Chunk {
            text: format!("{name}-{idx}"),
            embedding,
            document_name: name.to_string(),
            source_url: format!("file://{name}"),
            sequence_index: idx,
        }
    }

    #[test]
    fn test_rank_orders_by_score() {
        let candidates = vec![
            chunk("a", 0, vec![0.0, 1.0]),
            chunk("b", 0, vec![1.0, 0.0]),
            chunk("c", 0, vec![1.0, 1.0]),
        ];
        let ranked = rank_top_k(&[1.0, 0.0], candidates, 3);
        let names: Vec<&str> = ranked.iter().map(|s| s.chunk.document_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert!(ranked[0].score >= ranked[1].score && ranked[1].score >= ranked[2].score);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let candidates = vec![
            chunk("first", 0, vec![1.0, 0.0]),
            chunk("second", 0, vec![2.0, 0.0]),
            chunk("third", 0, vec![3.0, 0.0]),
        ];
        let ranked = rank_top_k(&[1.0, 0.0], candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.document_name, "first");
        assert_eq!(ranked[1].chunk.document_name, "second");
    }

    #[test]
    fn test_rank_puts_nan_scores_last() {
        let candidates = vec![
            chunk("broken", 0, vec![f32::NAN, 0.0]),
            chunk("far", 0, vec![0.0, 1.0]),
            chunk("near", 0, vec![1.0, 0.0]),
        ];
        let ranked = rank_top_k(&[1.0, 0.0], candidates, 3);
        let names: Vec<&str> = ranked.iter().map(|s| s.chunk.document_name.as_str()).collect();
        assert_eq!(names, vec!["near", "far", "broken"]);
        assert!(ranked[2].score.is_nan());
    }

    #[test]
    fn test_rank_truncates_and_handles_zero_k() {
        let candidates = || (0..5).map(|i| chunk("d", i, vec![1.0]));
        assert_eq!(rank_top_k(&[1.0], candidates(), 3).len(), 3);
        assert_eq!(rank_top_k(&[1.0], candidates(), 10).len(), 5);
        assert!(rank_top_k(&[1.0], candidates(), 0).is_empty());
    }
}
