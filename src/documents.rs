//! `askdocs documents`: list what the current corpus was built from.

use anyhow::Result;

use crate::app::open_pipeline;
use crate::config::Config;

pub async fn run_documents(config: &Config, json: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let documents = pipeline.documents().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents ingested.");
        return Ok(());
    }

    println!("{:<32} {:>6}  {:<20}  SOURCE", "NAME", "CHUNKS", "INGESTED");
    for doc in &documents {
        println!(
            "{:<32} {:>6}  {:<20}  {}",
            doc.name,
            doc.chunk_count,
            doc.ingested_at.format("%Y-%m-%d %H:%M:%S"),
            doc.source_url
        );
    }
    println!(
        "\n{} documents, {} chunks.",
        documents.len(),
        pipeline.chunk_count().await?
    );
    Ok(())
}
