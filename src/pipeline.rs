//! Ingestion and question answering over a single live corpus.
//!
//! [`Pipeline`] sequences the adapters:
//!
//! ```text
//! ingest:  item → extract → chunk → [upload] → embed (batched, retried) → insert → catalog
//! ask:     question → retrieve (embed + search) → compose → generate → ChatTurn
//! ```
//!
//! # Corpus policy
//!
//! Every ingestion batch replaces the corpus. The old chunks, catalog rows
//! and stored originals are removed before anything new is written, and
//! nothing of the previous corpus is kept for rollback. If the batch aborts
//! part-way, the corpus stays empty or partial and the state becomes
//! [`CorpusState::Degraded`] until the next successful batch.
//!
//! # Failure handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | extraction / chunking | document skipped |
//! | blob upload | document skipped |
//! | transient embedding error | retried with exponential backoff |
//! | permanent embedding error, retries exhausted | document skipped |
//! | index or catalog write error | batch aborted |
//! | embed or insert timeout | batch aborted |
//! | every document skipped | batch fails with [`IngestError::NothingIndexed`] |
//! | retrieval error or timeout | query answered from an empty result |
//! | generation error or timeout | [`Answer::Failed`] |
//!
//! Ingestion batches are serialized by an internal mutex; concurrent calls
//! wait their turn. Queries never take that lock.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use askdocs_core::blob::BlobStore;
use askdocs_core::chunk::{chunk_text, ChunkParams};
use askdocs_core::embedding::{check_response, Embedder};
use askdocs_core::error::{ChunkingError, EmbeddingError, GenerationError, IndexWriteError};
use askdocs_core::generate::Generator;
use askdocs_core::models::{Answer, ChatTurn, Chunk, DocumentRecord, RetrievalResult};
use askdocs_core::prompt::compose;
use askdocs_core::retrieve::Retriever;
use askdocs_core::store::{Catalog, IndexStore};

use crate::config::Config;

/// Where a document came from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Content cited by URL only, such as a fetched web page.
    Url { url: String },
    /// An uploaded original. `bytes` go to blob storage when one is
    /// configured; otherwise `local_url` is cited.
    Upload {
        bytes: Vec<u8>,
        content_type: String,
        local_url: String,
    },
}

/// One document handed to [`Pipeline::ingest`].
#[derive(Debug, Clone)]
pub struct IngestItem {
    pub name: String,
    pub source: DocumentSource,
    /// Extracted text, or why extraction failed.
    pub raw_text: Result<String, ChunkingError>,
}

impl IngestItem {
    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: DocumentSource::Url { url: url.into() },
            raw_text: Ok(raw_text.into()),
        }
    }

    pub fn upload(
        name: impl Into<String>,
        local_url: impl Into<String>,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        raw_text: Result<String, ChunkingError>,
    ) -> Self {
        Self {
            name: name.into(),
            source: DocumentSource::Upload {
                bytes,
                content_type: content_type.into(),
                local_url: local_url.into(),
            },
            raw_text,
        }
    }

    fn cited_url(&self) -> &str {
        match &self.source {
            DocumentSource::Url { url } => url,
            DocumentSource::Upload { local_url, .. } => local_url,
        }
    }
}

/// Pipeline step a document outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clear,
    Extract,
    Chunk,
    Upload,
    Embed,
    Insert,
    Catalog,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clear => "clear",
            Stage::Extract => "extract",
            Stage::Chunk => "chunk",
            Stage::Upload => "upload",
            Stage::Embed => "embed",
            Stage::Insert => "insert",
            Stage::Catalog => "catalog",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Indexed { chunks: usize },
    /// The document was left out; the rest of the batch went on.
    Skipped { stage: Stage, reason: String },
    /// The document's failure aborted the batch.
    Aborted { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub name: String,
    pub source_url: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

/// Per-document results of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents: Vec<DocumentOutcome>,
    pub chunks_indexed: usize,
}

impl IngestReport {
    pub fn indexed(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Indexed { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.documents
            .iter()
            .filter(|d| !matches!(d.status, DocumentStatus::Indexed { .. }))
    }

    fn push(&mut self, name: &str, source_url: &str, status: DocumentStatus) {
        if let DocumentStatus::Indexed { chunks } = status {
            self.chunks_indexed += chunks;
        }
        self.documents.push(DocumentOutcome {
            name: name.to_string(),
            source_url: source_url.to_string(),
            status,
        });
    }
}

/// Why an ingestion batch did not complete.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The previous corpus could not be removed; nothing new was written.
    #[error("failed to clear the previous corpus: {0}")]
    Clear(#[source] IndexWriteError),

    /// A write failed part-way; the corpus holds what was written before it.
    #[error("ingestion aborted: {source}")]
    Write {
        #[source]
        source: IndexWriteError,
        report: IngestReport,
    },

    #[error("ingestion aborted: {stage} of '{document}' timed out after {}s", .limit.as_secs())]
    Timeout {
        document: String,
        stage: Stage,
        limit: Duration,
        report: IngestReport,
    },

    /// Every document in the batch was skipped.
    #[error("no documents were indexed")]
    NothingIndexed { report: IngestReport },
}

impl IngestError {
    /// Per-document results gathered before the failure, when any.
    pub fn report(&self) -> Option<&IngestReport> {
        match self {
            IngestError::Clear(_) => None,
            IngestError::Write { report, .. }
            | IngestError::Timeout { report, .. }
            | IngestError::NothingIndexed { report } => Some(report),
        }
    }
}

/// Lifecycle of the live corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CorpusState {
    Empty,
    Ingesting,
    Ready,
    /// The last batch aborted; the corpus may be empty or partial.
    Degraded { reason: String },
}

/// Tunables for the pipeline, independent of any adapter.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunking: ChunkParams,
    pub k: usize,
    pub min_score: Option<f32>,
    pub embed_batch_size: usize,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub embed_timeout: Duration,
    pub store_timeout: Duration,
    pub generate_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::default(),
            k: askdocs_core::retrieve::DEFAULT_TOP_K,
            min_score: None,
            embed_batch_size: 64,
            max_retries: 5,
            retry_base: Duration::from_millis(500),
            embed_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
            generate_timeout: Duration::from_secs(60),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.params(),
            k: config.retrieval.k,
            min_score: config.retrieval.min_score,
            embed_batch_size: config.embedding.batch_size.max(1),
            max_retries: config.embedding.max_retries,
            retry_base: Duration::from_millis(config.embedding.retry_base_ms),
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            store_timeout: Duration::from_secs(config.db.timeout_secs),
            generate_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }

    /// Backoff before retry `attempt` (1-based): base, 2×base, 4×base, … capped at 32×base.
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base * (1u32 << (attempt - 1).min(5))
    }
}

/// Everything the pipeline talks to, passed in explicitly.
pub struct PipelineConfig {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn IndexStore>,
    pub catalog: Arc<dyn Catalog>,
    pub blobs: Option<Arc<dyn BlobStore>>,
    pub generator: Arc<dyn Generator>,
    pub settings: PipelineSettings,
}

pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    catalog: Arc<dyn Catalog>,
    blobs: Option<Arc<dyn BlobStore>>,
    generator: Arc<dyn Generator>,
    retriever: Retriever,
    settings: PipelineSettings,
    ingest_lock: Mutex<()>,
    state: RwLock<CorpusState>,
}

enum EmbedFailure {
    Failed(EmbeddingError),
    TimedOut,
}

/// Per-document result inside the ingestion loop.
enum Step {
    Indexed(usize),
    Skipped(Stage, String),
}

/// Batch-level abort raised from the ingestion loop.
enum Abort {
    Write(IndexWriteError),
    Timeout(Stage, Duration),
}

async fn bounded<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}

impl Pipeline {
    /// Build a pipeline whose corpus starts out [`CorpusState::Empty`].
    pub fn new(config: PipelineConfig) -> Self {
        let retriever = Retriever::new(Arc::clone(&config.embedder), Arc::clone(&config.store))
            .with_k(config.settings.k)
            .with_min_score(config.settings.min_score);

        Self {
            embedder: config.embedder,
            store: config.store,
            catalog: config.catalog,
            blobs: config.blobs,
            generator: config.generator,
            retriever,
            settings: config.settings,
            ingest_lock: Mutex::new(()),
            state: RwLock::new(CorpusState::Empty),
        }
    }

    /// Like [`Pipeline::new`], but starts [`CorpusState::Ready`] when the
    /// store already holds chunks from an earlier run.
    pub async fn open(config: PipelineConfig) -> Self {
        let pipeline = Self::new(config);
        match bounded(pipeline.settings.store_timeout, pipeline.store.count()).await {
            Some(Ok(n)) if n > 0 => pipeline.set_state(CorpusState::Ready),
            Some(Ok(_)) => {}
            Some(Err(e)) => warn!(error = %e, "could not read index size"),
            None => warn!("timed out reading index size"),
        }
        pipeline
    }

    pub fn state(&self) -> CorpusState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_state(&self, next: CorpusState) {
        debug!(state = ?next, "corpus state");
        match self.state.write() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Replace the corpus with `items`.
    pub async fn ingest(&self, items: Vec<IngestItem>) -> Result<IngestReport, IngestError> {
        let _guard = self.ingest_lock.lock().await;
        self.set_state(CorpusState::Ingesting);
        info!(documents = items.len(), "ingestion started");

        if let Err(e) = self.clear_corpus().await {
            self.set_state(CorpusState::Degraded {
                reason: e.to_string(),
            });
            return Err(IngestError::Clear(e));
        }

        let mut report = IngestReport::default();
        for item in &items {
            match self.ingest_one(item, &mut report).await {
                Ok(()) => {}
                Err(abort) => {
                    let err = match abort {
                        Abort::Write(source) => IngestError::Write { source, report },
                        Abort::Timeout(stage, limit) => IngestError::Timeout {
                            document: item.name.clone(),
                            stage,
                            limit,
                            report,
                        },
                    };
                    warn!(error = %err, "ingestion aborted");
                    self.set_state(CorpusState::Degraded {
                        reason: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }

        let indexed = report.indexed().count();
        info!(
            indexed,
            skipped = report.documents.len() - indexed,
            chunks = report.chunks_indexed,
            "ingestion finished"
        );

        if indexed == 0 {
            self.set_state(CorpusState::Empty);
            if items.is_empty() {
                return Ok(report);
            }
            return Err(IngestError::NothingIndexed { report });
        }

        self.set_state(CorpusState::Ready);
        Ok(report)
    }

    /// Remove stored originals, catalog rows and chunks of the live corpus.
    async fn clear_corpus(&self) -> Result<(), IndexWriteError> {
        let limit = self.settings.store_timeout;
        let timed_out = || format!("timed out after {}s", limit.as_secs());

        if let Some(blobs) = &self.blobs {
            match bounded(limit, self.catalog.list_documents()).await {
                Some(Ok(records)) => {
                    let keys: Vec<String> = records.into_iter().filter_map(|r| r.blob_key).collect();
                    if !keys.is_empty() {
                        match bounded(limit, blobs.delete(&keys)).await {
                            Some(Ok(())) => {}
                            Some(Err(e)) => warn!(error = %e, "failed to delete previous uploads"),
                            None => warn!("timed out deleting previous uploads"),
                        }
                    }
                }
                Some(Err(e)) => warn!(error = %e, "could not list previous uploads"),
                None => warn!("timed out listing previous uploads"),
            }
        }

        bounded(limit, self.catalog.clear_documents())
            .await
            .unwrap_or_else(|| Err(IndexWriteError::Catalog(timed_out())))?;
        bounded(limit, self.store.clear())
            .await
            .unwrap_or_else(|| Err(IndexWriteError::Clear(timed_out())))?;
        Ok(())
    }

    async fn ingest_one(&self, item: &IngestItem, report: &mut IngestReport) -> Result<(), Abort> {
        let mut source_url = item.cited_url().to_string();
        let mut blob_key = None;

        let step = self
            .index_document(item, &mut source_url, &mut blob_key)
            .await;

        match step {
            Ok(Step::Indexed(chunks)) => {
                let record = DocumentRecord {
                    name: item.name.clone(),
                    source_url: source_url.clone(),
                    blob_key: blob_key.clone(),
                    chunk_count: chunks,
                    ingested_at: Utc::now(),
                };
                let recorded = bounded(
                    self.settings.store_timeout,
                    self.catalog.record_document(&record),
                )
                .await;
                match recorded {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        self.discard_upload(&item.name, blob_key).await;
                        report.push(&item.name, &source_url, aborted(Stage::Catalog, &e));
                        return Err(Abort::Write(e));
                    }
                    None => {
                        self.discard_upload(&item.name, blob_key).await;
                        report.push(
                            &item.name,
                            &source_url,
                            aborted(Stage::Catalog, "timed out"),
                        );
                        return Err(Abort::Timeout(Stage::Catalog, self.settings.store_timeout));
                    }
                }
                info!(document = %item.name, chunks, "document indexed");
                report.push(&item.name, &source_url, DocumentStatus::Indexed { chunks });
                Ok(())
            }
            Ok(Step::Skipped(stage, reason)) => {
                warn!(document = %item.name, %stage, %reason, "document skipped");
                self.discard_upload(&item.name, blob_key).await;
                report.push(
                    &item.name,
                    &source_url,
                    DocumentStatus::Skipped { stage, reason },
                );
                Ok(())
            }
            Err(abort) => {
                let (stage, reason) = match &abort {
                    Abort::Write(e) => (Stage::Insert, e.to_string()),
                    Abort::Timeout(stage, _) => (*stage, "timed out".to_string()),
                };
                self.discard_upload(&item.name, blob_key).await;
                report.push(
                    &item.name,
                    &source_url,
                    DocumentStatus::Aborted { stage, reason },
                );
                Err(abort)
            }
        }
    }

    /// Best-effort removal of an upload whose document never reached the catalog.
    async fn discard_upload(&self, document: &str, blob_key: Option<String>) {
        let (Some(blobs), Some(key)) = (&self.blobs, blob_key) else {
            return;
        };
        match bounded(self.settings.store_timeout, blobs.delete(&[key])).await {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(document, error = %e, "failed to remove upload"),
            None => warn!(document, "timed out removing upload"),
        }
    }

    /// Extract, chunk, upload, embed and insert one document.
    async fn index_document(
        &self,
        item: &IngestItem,
        source_url: &mut String,
        blob_key: &mut Option<String>,
    ) -> Result<Step, Abort> {
        let text = match &item.raw_text {
            Ok(text) => text,
            Err(e) => return Ok(Step::Skipped(Stage::Extract, e.to_string())),
        };

        let pieces = match chunk_text(text, &self.settings.chunking) {
            Ok(pieces) if pieces.is_empty() => {
                return Ok(Step::Skipped(Stage::Chunk, "no text to index".to_string()))
            }
            Ok(pieces) => pieces,
            Err(e) => return Ok(Step::Skipped(Stage::Chunk, e.to_string())),
        };

        if let (Some(blobs), DocumentSource::Upload { bytes, content_type, .. }) =
            (&self.blobs, &item.source)
        {
            let stored = bounded(
                self.settings.store_timeout,
                blobs.put(&item.name, bytes, content_type),
            )
            .await;
            match stored {
                Some(Ok(stored)) => {
                    *source_url = stored.url;
                    *blob_key = Some(stored.key);
                }
                Some(Err(e)) => return Ok(Step::Skipped(Stage::Upload, e.to_string())),
                None => return Ok(Step::Skipped(Stage::Upload, "timed out".to_string())),
            }
        }

        let texts: Vec<String> = pieces.into_iter().map(|p| p.text).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.settings.embed_batch_size) {
            match self.embed_with_retry(batch).await {
                Ok(batch_vectors) => match check_response(
                    batch_vectors,
                    batch.len(),
                    self.embedder.dims(),
                ) {
                    Ok(batch_vectors) => vectors.extend(batch_vectors),
                    Err(e) => return Ok(Step::Skipped(Stage::Embed, e.to_string())),
                },
                Err(EmbedFailure::Failed(e)) => {
                    return Ok(Step::Skipped(Stage::Embed, e.to_string()))
                }
                Err(EmbedFailure::TimedOut) => {
                    return Err(Abort::Timeout(Stage::Embed, self.settings.embed_timeout))
                }
            }
        }

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(sequence_index, (text, embedding))| Chunk {
                text,
                embedding,
                document_name: item.name.clone(),
                source_url: source_url.clone(),
                sequence_index,
            })
            .collect();

        match bounded(self.settings.store_timeout, self.store.insert(&chunks)).await {
            Some(Ok(written)) => Ok(Step::Indexed(written)),
            Some(Err(e)) => Err(Abort::Write(e)),
            None => Err(Abort::Timeout(Stage::Insert, self.settings.store_timeout)),
        }
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedFailure> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(self.settings.backoff(attempt)).await;
            }
            match bounded(self.settings.embed_timeout, self.embedder.embed_batch(texts)).await {
                None => return Err(EmbedFailure::TimedOut),
                Some(Ok(vectors)) => return Ok(vectors),
                Some(Err(e)) if e.is_transient() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(attempt, max = self.settings.max_retries, error = %e, "retrying embedding");
                }
                Some(Err(e)) => return Err(EmbedFailure::Failed(e)),
            }
        }
    }

    /// Chunks most similar to `question`, or an empty result when the
    /// lookup fails.
    pub async fn retrieve(&self, question: &str) -> RetrievalResult {
        let limit = self.settings.embed_timeout + self.settings.store_timeout;
        match bounded(limit, self.retriever.retrieve(question)).await {
            Some(Ok(result)) => result,
            Some(Err(e)) => {
                warn!(error = %e, "retrieval failed; answering without context");
                RetrievalResult::empty()
            }
            None => {
                warn!("retrieval timed out; answering without context");
                RetrievalResult::empty()
            }
        }
    }

    /// Answer `question` from the corpus and append the turn to `history`.
    pub async fn ask(&self, question: &str, history: &mut Vec<ChatTurn>) -> ChatTurn {
        let question = question.trim();
        let (answer, retrieval) = if question.is_empty() {
            (Answer::NoAnswer, RetrievalResult::empty())
        } else {
            let retrieval = self.retrieve(question).await;
            let prompt = compose(question, &retrieval.texts());
            (self.generate(&prompt).await, retrieval)
        };

        let turn = ChatTurn {
            question: question.to_string(),
            answer,
            retrieval,
        };
        history.push(turn.clone());
        turn
    }

    async fn generate(&self, prompt: &str) -> Answer {
        let limit = self.settings.generate_timeout;
        match bounded(limit, self.generator.generate(prompt)).await {
            Some(Ok(text)) if text.trim().is_empty() => Answer::NoAnswer,
            Some(Ok(text)) => Answer::Generated(text),
            Some(Err(e)) => {
                warn!(error = %e, "generation failed");
                Answer::Failed(e.to_string())
            }
            None => {
                let e = GenerationError::Timeout(limit.as_secs());
                warn!(error = %e, "generation failed");
                Answer::Failed(e.to_string())
            }
        }
    }

    pub async fn documents(&self) -> anyhow::Result<Vec<DocumentRecord>> {
        Ok(self.catalog.list_documents().await?)
    }

    pub async fn chunk_count(&self) -> anyhow::Result<usize> {
        Ok(self.store.count().await?)
    }
}

fn aborted(stage: Stage, reason: impl fmt::Display) -> DocumentStatus {
    DocumentStatus::Aborted {
        stage,
        reason: reason.to_string(),
    }
}
