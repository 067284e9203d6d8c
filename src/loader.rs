//! Builds [`IngestItem`]s from local paths and web pages.
//!
//! Directories are walked recursively and filtered with include globs;
//! explicitly named files are taken as long as their extension is
//! supported. Web pages are fetched one URL at a time with no link
//! discovery.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

use crate::extract::{content_type_for_extension, extract_text, html_to_text, MIME_HTML};
use crate::pipeline::IngestItem;

pub fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Load every supported file under `paths`.
///
/// Items come back sorted by name so repeated runs ingest in the same
/// order. Unreadable content does not fail the load; it is carried in the
/// item and reported by the pipeline.
pub fn load_paths(paths: &[PathBuf], include_globs: &[String]) -> Result<Vec<IngestItem>> {
    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(
        &DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
    )?;

    let mut items = Vec::new();
    for path in paths {
        if !path.exists() {
            bail!("Path does not exist: {}", path.display());
        }

        if path.is_file() {
            items.push(load_file(path, &file_name(path))?);
            continue;
        }

        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file = entry.path();
            let relative = file.strip_prefix(path).unwrap_or(file);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            if supported_content_type(file).is_none() {
                debug!(path = %file.display(), "skipping unsupported file type");
                continue;
            }
            items.push(load_file(file, &rel_str)?);
        }
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Read one file as an upload named `name`.
pub fn load_file(path: &Path, name: &str) -> Result<IngestItem> {
    let content_type = supported_content_type(path).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported file type: {} (expected .pdf, .txt, .md or .html)",
            path.display()
        )
    })?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let raw_text = extract_text(&bytes, content_type);
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    Ok(IngestItem::upload(
        name,
        format!("file://{}", absolute.display()),
        bytes,
        content_type,
        raw_text,
    ))
}

/// Fetch a single web page and reduce it to visible text.
pub async fn fetch_url(url: &str, timeout_secs: u64) -> Result<IngestItem> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("URL must start with http:// or https://: {}", url);
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Fetching {} returned HTTP {}", url, status);
    }

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |ct| ct.starts_with(MIME_HTML));
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read body of {}", url))?;
    let text = if is_html { html_to_text(&body) } else { body };

    Ok(IngestItem::from_url(url, url, text))
}

fn supported_content_type(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(content_type_for_extension)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
