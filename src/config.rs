use anyhow::{Context, Result};
use askdocs_core::chunk::ChunkParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./config/askdocs.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Per-call bound on index reads and writes.
    #[serde(default = "default_db_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_db_timeout_secs() -> u64 {
    10
}

/// Sizes are in characters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            target_size: self.target_size,
            overlap: self.overlap,
        }
    }
}

fn default_target_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Unset: return the nearest `k` regardless of score.
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_score: None,
        }
    }
}

fn default_k() -> usize {
    askdocs_core::retrieve::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            max_input_chars: default_max_input_chars(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    /// Vector size: the configured value, or the hash embedder's default.
    pub fn resolved_dims(&self) -> usize {
        self.dims.unwrap_or(HASH_DEFAULT_DIMS)
    }
}

const HASH_DEFAULT_DIMS: usize = 256;

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_max_input_chars() -> usize {
    8000
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            temperature: None,
        }
    }
}

fn default_generation_provider() -> String {
    "echo".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_provider")]
    pub provider: String,
    /// Root directory for the `local` provider.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Bucket for the `supabase` provider.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            path: None,
            bucket: default_bucket(),
        }
    }
}

fn default_storage_provider() -> String {
    "none".to_string()
}
fn default_bucket() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Chunking
    if config.chunking.target_size == 0 {
        anyhow::bail!("chunking.target_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.target_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
            config.chunking.overlap,
            config.chunking.target_size
        );
    }
    if config.chunking.target_size + config.chunking.overlap > config.embedding.max_input_chars {
        anyhow::bail!(
            "chunking.target_size + chunking.overlap ({}) exceeds embedding.max_input_chars ({})",
            config.chunking.target_size + config.chunking.overlap,
            config.embedding.max_input_chars
        );
    }

    // Retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if let Some(min) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&min) {
            anyhow::bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "hash" => {}
        "openai" | "ollama" | "local" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Generation
    match config.generation.provider.as_str() {
        "echo" | "gemini" | "openai" => {}
        "ollama" => {
            if config.generation.model.is_none() {
                anyhow::bail!("generation.model must be specified when provider is 'ollama'");
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be echo, gemini, openai, or ollama.",
            other
        ),
    }

    // Storage
    match config.storage.provider.as_str() {
        "none" | "supabase" => {}
        "local" => {
            if config.storage.path.is_none() {
                anyhow::bail!("storage.path must be specified when provider is 'local'");
            }
        }
        other => anyhow::bail!(
            "Unknown storage provider: '{}'. Must be none, local, or supabase.",
            other
        ),
    }

    Ok(config)
}
