//! HTTP embedding providers.
//!
//! Implements [`EmbeddingProvider`] for three backends:
//! - **gemini**: `POST /v1beta/{model}:batchEmbedContents` (needs `GOOGLE_API_KEY`).
//! - **openai**: `POST /v1/embeddings` (needs `OPENAI_API_KEY`).
//! - **ollama**: `POST /api/embed` on a local Ollama instance.
//!
//! Plus [`DisabledProvider`], which fails every call; useful for inspecting
//! persisted state without network access.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use subject_tutor::config::EmbeddingConfig;
//! # use subject_tutor::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "gemini"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "models/embedding-001");
//! ```
//!
//! Texts are sent in batches of `embedding.batch_size`; each request is
//! retried as described in [`crate::http`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub use subject_tutor_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::http::{base_url, build_client, post_json, Auth};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Read a required API key from the environment.
pub(crate) fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} environment variable not set", var),
    }
}

/// Gemini addresses models as `models/<name>`.
pub(crate) fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Gemini,
    OpenAI,
    Ollama,
}

impl Backend {
    fn label(self) -> &'static str {
        match self {
            Backend::Gemini => "Gemini",
            Backend::OpenAI => "OpenAI",
            Backend::Ollama => "Ollama",
        }
    }
}

/// Embedding provider backed by a hosted or local HTTP API.
pub struct HttpEmbedder {
    backend: Backend,
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: Option<String>,
    batch_size: usize,
    max_retries: u32,
}

impl HttpEmbedder {
    fn new(backend: Backend, config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        let default_url = match backend {
            Backend::Gemini => GEMINI_URL,
            Backend::OpenAI => OPENAI_URL,
            Backend::Ollama => OLLAMA_URL,
        };
        Ok(Self {
            backend,
            client: build_client(config.timeout_secs)?,
            model: config.model.clone(),
            url: base_url(config.url.as_deref().unwrap_or(default_url)).to_string(),
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    fn auth(&self) -> Auth<'_> {
        match (self.backend, self.api_key.as_deref()) {
            (Backend::Gemini, Some(key)) => Auth::GoogleKey(key),
            (Backend::OpenAI, Some(key)) => Auth::Bearer(key),
            _ => Auth::None,
        }
    }

    async fn embed_batch(&self, batch: &[String], task_type: &str) -> Result<Vec<Vec<f32>>> {
        let label = self.backend.label();
        let vectors = match self.backend {
            Backend::Gemini => {
                let model = gemini_model_path(&self.model);
                let url = format!("{}/v1beta/{}:batchEmbedContents", self.url, model);
                let requests: Vec<Value> = batch
                    .iter()
                    .map(|text| {
                        json!({
                            "model": model,
                            "content": { "parts": [{ "text": text }] },
                            "taskType": task_type,
                        })
                    })
                    .collect();
                let body = json!({ "requests": requests });
                let resp =
                    post_json(&self.client, &url, self.auth(), &body, self.max_retries, label)
                        .await?;
                parse_gemini_response(&resp)?
            }
            Backend::OpenAI => {
                let url = format!("{}/v1/embeddings", self.url);
                let body = json!({ "model": self.model, "input": batch });
                let resp = post_json(
                    &self.client,
                    &url,
                    self.auth(),
                    &body,
                    self.max_retries,
                    label,
                )
                .await?;
                parse_openai_response(&resp)?
            }
            Backend::Ollama => {
                let url = format!("{}/api/embed", self.url);
                let body = json!({ "model": self.model, "input": batch });
                let resp =
                    post_json(&self.client, &url, self.auth(), &body, self.max_retries, label)
                        .await
                        .with_context(|| format!("is Ollama running at {}?", self.url))?;
                parse_ollama_response(&resp)?
            }
        };

        if vectors.len() != batch.len() {
            bail!(
                "{} returned {} embeddings for {} texts",
                label,
                vectors.len(),
                batch.len()
            );
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch, "RETRIEVAL_DOCUMENT").await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()], "RETRIEVAL_QUERY")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Provider used when `embedding.provider = "disabled"`.
pub struct DisabledProvider {
    model: String,
}

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

fn parse_float_array(value: &Value, what: &str) -> Result<Vec<f32>> {
    Ok(value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Extract `embeddings[].values` from a Gemini batch response.
fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?
        .iter()
        .map(|item| {
            let values = item
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            parse_float_array(values, "Gemini")
        })
        .collect()
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_float_array(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| parse_float_array(e, "Ollama"))
        .collect()
}

/// Create the configured provider.
///
/// # Errors
///
/// Fails for unknown provider names and when a hosted provider's API key
/// is missing from the environment.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "gemini" => Arc::new(HttpEmbedder::new(
            Backend::Gemini,
            config,
            Some(api_key("GOOGLE_API_KEY")?),
        )?),
        "openai" => Arc::new(HttpEmbedder::new(
            Backend::OpenAI,
            config,
            Some(api_key("OPENAI_API_KEY")?),
        )?),
        "ollama" => Arc::new(HttpEmbedder::new(Backend::Ollama, config, None)?),
        "disabled" => Arc::new(DisabledProvider {
            model: config.model.clone(),
        }),
        other => bail!("Unknown embedding provider: {}", other),
    };
    Ok(provider)
}
