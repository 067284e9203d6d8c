//! Error taxonomy shared by every pipeline stage.
//!
//! Adapters (embedders, stores, generators, blob stores) convert their
//! transport errors into these types at their boundary, so the orchestrator
//! only ever sees the kinds below and can decide per kind whether to retry,
//! skip a document, abort a batch, or degrade a query.

use thiserror::Error;

/// The input could not be split into chunks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("invalid chunking parameters: target_size={target_size}, overlap={overlap}")]
    InvalidParameters { target_size: usize, overlap: usize },

    /// Binary or otherwise unreadable content.
    #[error("unreadable input: {0}")]
    Unreadable(String),
}

/// Failure to turn text into a vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty input")]
    EmptyInput,

    #[error("input of {chars} chars exceeds the model limit of {max}")]
    InputTooLong { chars: usize, max: usize },

    /// Network fault, timeout, rate limit or server error. Worth retrying.
    #[error("transient embedding failure: {0}")]
    Transient(String),

    /// Rejected request or unusable response. Retrying will not help.
    #[error("embedding failed: {0}")]
    Permanent(String),
}

impl EmbeddingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

/// Failure to mutate the index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexWriteError {
    #[error("failed to clear index: {0}")]
    Clear(String),

    /// Insertion stopped part-way; `inserted` chunks of the call were written.
    #[error(
        "failed to insert chunk {sequence_index} of '{document_name}' \
         ({inserted} chunks written before the failure): {reason}"
    )]
    Insert {
        document_name: String,
        sequence_index: usize,
        inserted: usize,
        reason: String,
    },

    #[error("chunk {sequence_index} of '{document_name}' has {actual} dimensions, index holds {expected}")]
    DimensionMismatch {
        document_name: String,
        sequence_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("failed to update document catalog: {0}")]
    Catalog(String),
}

impl IndexWriteError {
    /// Name of the document whose chunk failed, when the failure is tied to one.
    pub fn document_name(&self) -> Option<&str> {
        match self {
            IndexWriteError::Insert { document_name, .. }
            | IndexWriteError::DimensionMismatch { document_name, .. } => Some(document_name),
            _ => None,
        }
    }
}

/// Failure to read from the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("index read failed: {0}")]
pub struct IndexReadError(pub String);

/// Failure to produce an answer from the language model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generator misconfigured: {0}")]
    Config(String),

    #[error("request to language model failed: {0}")]
    Transport(String),

    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model quota exhausted: {0}")]
    Quota(String),

    #[error("malformed response from language model: {0}")]
    Malformed(String),

    #[error("language model did not answer within {0}s")]
    Timeout(u64),
}

/// Failure to store or delete an original upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("upload of '{name}' failed: {reason}")]
    Upload { name: String, reason: String },

    #[error("failed to delete stored blobs: {0}")]
    Delete(String),
}

/// Failure to retrieve chunks for a question.
///
/// The orchestrator degrades both kinds to an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexReadError),
}
