//! # askdocs core
//!
//! Pure logic for the askdocs retrieval-augmented generation pipeline:
//! data models, the error taxonomy, chunking, ranking, prompt composition,
//! and the capability traits behind which every external service lives
//! ([`embedding::Embedder`], [`store::IndexStore`], [`store::Catalog`],
//! [`generate::Generator`], [`blob::BlobStore`]).
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Offline
//! implementations ([`embedding::HashEmbedder`], [`store::memory::InMemoryStore`],
//! [`generate::EchoGenerator`]) make the whole pipeline testable without
//! network access.

pub mod blob;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;
