//! Language-model generators.
//!
//! Thin clients, one request per call, no retries:
//! - `echo`   — [`EchoGenerator`] from the core crate (offline)
//! - `gemini` — `POST /v1beta/models/{model}:generateContent` (`GEMINI_API_KEY`)
//! - `openai` — `POST /v1/chat/completions` (`OPENAI_API_KEY`)
//! - `ollama` — `POST {url}/api/generate` with `stream=false`
//!
//! Every transport, status and decoding failure becomes a
//! [`GenerationError`]; answers are returned trimmed.

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use askdocs_core::error::GenerationError;
use askdocs_core::generate::{EchoGenerator, Generator};

use crate::config::GenerationConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-pro";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Transport(e.to_string())
}

/// Turn a non-2xx response into a [`GenerationError`], keeping a short body snippet.
async fn status_error(response: reqwest::Response) -> GenerationError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let snippet: String = text.chars().take(240).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::Quota(snippet)
    } else {
        GenerationError::Status {
            status: status.as_u16(),
            body: snippet,
        }
    }
}

// ============ Gemini ============

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: [GeminiContent<'a>; 1],
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String, GenerationError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Malformed("no candidates in response".into()))?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        Ok(parts.into_iter().map(|p| p.text).collect::<String>())
    }
}

/// Google Gemini `generateContent` client.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GeminiRequest {
            contents: [GeminiContent {
                parts: [GeminiPart { text: prompt }],
            }],
            generation_config: self
                .temperature
                .map(|temperature| GeminiGenerationConfig { temperature }),
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let out: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        Ok(out.into_text()?.trim().to_string())
    }
}

// ============ OpenAI ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions client (also fits compatible gateways via `generation.url`).
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let out: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let choice = out
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Malformed("no choices in response".into()))?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Non-streaming Ollama `/api/generate` client.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url_generate: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let endpoint = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL).trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("invalid Ollama endpoint: {}", endpoint);
        }
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url_generate: format!("{}/api/generate", endpoint.trim_end_matches('/')),
            model,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self
                .temperature
                .map(|temperature| OllamaOptions { temperature }),
        };

        debug!("POST {}", self.url_generate);
        let response = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let out: OllamaGenerateResponse = response.json().await.map_err(|e| {
            GenerationError::Malformed(format!("{e}; ensure `stream=false` is used"))
        })?;
        Ok(out.response.trim().to_string())
    }
}

/// Build the [`Generator`] named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "echo" => Ok(Arc::new(EchoGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
