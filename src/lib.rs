//! # askdocs
//!
//! Retrieval-augmented question answering over a single, replaceable
//! corpus of documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │   Loader    │──▶│     Pipeline     │──▶│  SQLite  │
//! │ PDF/MD/Web  │   │ Chunk+Embed+Blob │   │ BLOB vec │
//! └─────────────┘   └────────┬─────────┘   └────┬─────┘
//!                            │  ask             │ search
//!                            ▼                  │
//!                     ┌─────────────┐◀──────────┘
//!                     │  Generator  │
//!                     └──────┬──────┘
//!                  ┌─────────┴─────────┐
//!                  ▼                   ▼
//!             ┌──────────┐       ┌──────────┐
//!             │   CLI    │       │   HTTP   │
//!             └──────────┘       └──────────┘
//! ```
//!
//! Pure logic (chunking, ranking, prompt composition, the adapter traits)
//! lives in `askdocs-core`; this crate supplies configuration, the SQLite
//! store, HTTP adapters and the [`pipeline::Pipeline`] that sequences them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] | Index store and document catalog on SQLite |
//! | [`embedding`] | OpenAI, Ollama and local embedding providers |
//! | [`generation`] | Gemini, OpenAI and Ollama generators |
//! | [`blob`] | Local and Supabase blob storage for originals |
//! | [`extract`] / [`loader`] | Text extraction and input loading |
//! | [`pipeline`] | Ingestion and question answering |
//! | [`app`] | Builds a pipeline from configuration |
//! | [`server`] | HTTP API |
//! | [`ingest`] / [`ask`] / [`documents`] | CLI commands |
//! | [`logging`] | Tracing subscriber setup |

pub mod app;
pub mod ask;
pub mod blob;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod server;
pub mod sqlite_store;
