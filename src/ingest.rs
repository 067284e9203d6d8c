//! `askdocs ingest`: replace the corpus with local files and web pages.
//!
//! Prints one line per document and a summary. Any earlier corpus is
//! discarded first, whether or not the new batch succeeds.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::app::open_pipeline;
use crate::config::Config;
use crate::loader::{default_include_globs, fetch_url, load_paths};
use crate::pipeline::{DocumentStatus, IngestReport};

pub async fn run_ingest(config: &Config, paths: &[PathBuf], urls: &[String]) -> Result<()> {
    if paths.is_empty() && urls.is_empty() {
        bail!("Nothing to ingest: pass file or directory paths, or --url");
    }

    let mut items = load_paths(paths, &default_include_globs())?;
    for url in urls {
        items.push(fetch_url(url, config.embedding.timeout_secs).await?);
    }
    if items.is_empty() {
        bail!("No supported files found (expected .pdf, .txt or .md)");
    }

    let pipeline = open_pipeline(config).await?;
    match pipeline.ingest(items).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            if let Some(report) = e.report() {
                print_report(report);
            }
            Err(e.into())
        }
    }
}

pub fn print_report(report: &IngestReport) {
    for doc in &report.documents {
        match &doc.status {
            DocumentStatus::Indexed { chunks } => {
                println!("indexed  {}  ({} chunks)  {}", doc.name, chunks, doc.source_url)
            }
            DocumentStatus::Skipped { stage, reason } => {
                println!("skipped  {}  [{}] {}", doc.name, stage, reason)
            }
            DocumentStatus::Aborted { stage, reason } => {
                println!("failed   {}  [{}] {}", doc.name, stage, reason)
            }
        }
    }
    println!(
        "Ingested {} of {} documents ({} chunks).",
        report.indexed().count(),
        report.documents.len(),
        report.chunks_indexed
    );
}
