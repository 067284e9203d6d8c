//! Query-time retrieval: embed a question, rank stored chunks.
//!
//! The retriever is a thin sequence over two adapters. It does not apply
//! timeouts or degrade errors itself; the orchestrator wraps it and turns
//! any [`RetrieveError`] into an empty result.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::RetrieveError;
use crate::models::{RetrievalResult, RetrievedChunk};
use crate::store::IndexStore;

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Top-k semantic retriever over an [`IndexStore`].
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            embedder,
            store,
            k: DEFAULT_TOP_K,
            min_score: None,
        }
    }

    /// Number of chunks to return. Values below 1 are raised to 1.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    /// Drop entries scoring below `min_score`. Unset by default: the
    /// nearest `k` are returned regardless of absolute similarity.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Retrieve the chunks most similar to `question`, best first.
    ///
    /// A blank question or an empty corpus yields an empty result.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, RetrieveError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(RetrievalResult::empty());
        }
        if self.store.count().await? == 0 {
            return Ok(RetrievalResult::empty());
        }

        let query = self.embedder.embed(question).await?;
        let scored = self.store.search(&query, self.k).await?;

        let entries = scored
            .into_iter()
            .filter(|s| self.min_score.map_or(true, |min| s.score >= min))
            .map(RetrievedChunk::from)
            .collect();
        Ok(RetrievalResult::new(entries))
    }
}
