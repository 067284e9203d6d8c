//! Wires configured adapters into a [`Pipeline`].

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::blob::create_blob_store;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::migrate;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineSettings};
use crate::sqlite_store::SqliteStore;

/// Open the database (creating the schema if needed) and build the pipeline.
pub async fn open_pipeline(config: &Config) -> Result<Pipeline> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let blobs = create_blob_store(&config.storage)?;
    debug!(
        embedder = embedder.model_name(),
        generator = generator.model_name(),
        blobs = blobs.is_some(),
        "pipeline adapters ready"
    );

    Ok(Pipeline::open(PipelineConfig {
        embedder,
        store: store.clone(),
        catalog: store,
        blobs,
        generator,
        settings: PipelineSettings::from_config(config),
    })
    .await)
}
