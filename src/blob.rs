//! Blob stores for uploaded originals.
//!
//! - [`LocalBlobStore`] writes under a directory and cites `file://` URLs.
//! - [`SupabaseBlobStore`] uses the Supabase Storage REST API and cites the
//!   object's public URL.
//!
//! Keys look like `1a2b3c4d_docs/guide.pdf`: a short random prefix keeps
//! same-named uploads from different batches apart.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use askdocs_core::blob::{blob_key, BlobStore, StoredBlob};
use askdocs_core::error::BlobError;

use crate::config::StorageConfig;

fn fresh_key(name: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    blob_key(&id[..8], name)
}

/// Stores originals on the local filesystem.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create blob directory: {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve blob directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let key = fresh_key(name);
        let path = self.root.join(&key);
        let upload_err = |e: std::io::Error| BlobError::Upload {
            name: name.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(upload_err)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(upload_err)?;
        debug!(key = %key, bytes = bytes.len(), "stored blob");

        Ok(StoredBlob {
            url: format!("file://{}", path.display()),
            key,
        })
    }

    async fn delete(&self, keys: &[String]) -> Result<(), BlobError> {
        let mut failures = Vec::new();
        for key in keys {
            let path = self.root.join(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    // Drop the now-empty `<prefix>_docs` directory.
                    if let Some(parent) = path.parent() {
                        if parent != self.root {
                            let _ = tokio::fs::remove_dir(parent).await;
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{key}: {e}")),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BlobError::Delete(failures.join("; ")))
        }
    }
}

/// Stores originals in a Supabase Storage bucket.
///
/// Credentials come from `SUPABASE_URL` and `SUPABASE_KEY`.
pub struct SupabaseBlobStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl SupabaseBlobStore {
    pub fn new(bucket: &str) -> Result<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .map_err(|_| anyhow::anyhow!("SUPABASE_URL environment variable not set"))?;
        let api_key = std::env::var("SUPABASE_KEY")
            .map_err(|_| anyhow::anyhow!("SUPABASE_KEY environment variable not set"))?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket: bucket.to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, BlobError> {
        let key = fresh_key(name);
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, key
        );
        let upload_err = |reason: String| BlobError::Upload {
            name: name.to_string(),
            reason,
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upload_err(format!("HTTP {status}: {body}")));
        }

        Ok(StoredBlob {
            url: self.public_url(&key),
            key,
        })
    }

    async fn delete(&self, keys: &[String]) -> Result<(), BlobError> {
        if keys.is_empty() {
            return Ok(());
        }
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "prefixes": keys }))
            .send()
            .await
            .map_err(|e| BlobError::Delete(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Delete(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

/// Build the blob store named by `storage.provider`; `none` yields `None`.
pub fn create_blob_store(config: &StorageConfig) -> Result<Option<Arc<dyn BlobStore>>> {
    match config.provider.as_str() {
        "none" => Ok(None),
        "local" => {
            let root = config
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.path required for local provider"))?;
            Ok(Some(Arc::new(LocalBlobStore::new(root)?)))
        }
        "supabase" => Ok(Some(Arc::new(SupabaseBlobStore::new(&config.bucket)?))),
        other => anyhow::bail!("Unknown storage provider: {}", other),
    }
}
