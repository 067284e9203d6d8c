//! Core data models used throughout askdocs.
//!
//! These types represent the documents, chunks, retrieval results, and chat
//! turns that flow through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named unit of ingested content (an uploaded file or a fetched page).
///
/// Only lives for the duration of an ingestion batch; the derived
/// [`Chunk`]s are what the index keeps.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    /// Storage URL of the uploaded original, or the page's web URL.
    pub source_url: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// An indexed slice of a document together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub document_name: String,
    pub source_url: String,
    /// Position within the parent document, ascending from 0.
    pub sequence_index: usize,
}

/// A stored chunk paired with its similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// One entry of a [`RetrievalResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub document_name: String,
    pub source_url: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

impl From<ScoredChunk> for RetrievedChunk {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            text: scored.chunk.text,
            document_name: scored.chunk.document_name,
            source_url: scored.chunk.source_url,
            score: scored.score,
        }
    }
}

/// Chunks retrieved for one query, ordered by descending score.
///
/// Built per query and never persisted. An empty result is the expected
/// "no relevant information" outcome, not a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    entries: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn new(entries: Vec<RetrievedChunk>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[RetrievedChunk] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedChunk> {
        self.entries.iter()
    }

    /// Chunk texts in retrieval order, ready for the prompt composer.
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.text.as_str()).collect()
    }

    /// The highest-scoring entry, used as the answer's citation.
    pub fn top_source(&self) -> Option<&RetrievedChunk> {
        self.entries.first()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a RetrievedChunk;
    type IntoIter = std::slice::Iter<'a, RetrievedChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Outcome of the generation step of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Answer {
    /// The model produced a non-empty answer.
    Generated(String),
    /// The model answered, but with empty text.
    NoAnswer,
    /// Generation failed; carries the rendered cause.
    Failed(String),
}

impl Answer {
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Generated(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Answer::Failed(_))
    }
}

/// A question, its answer, and the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: Answer,
    pub retrieval: RetrievalResult,
}

/// Row of the persistent document listing.
///
/// Consulted only for display; retrieval never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub name: String,
    pub source_url: String,
    /// Key of the uploaded original in blob storage, if one was stored.
    pub blob_key: Option<String>,
    pub chunk_count: usize,
    pub ingested_at: DateTime<Utc>,
}
