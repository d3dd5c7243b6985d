//! HTTP generative-model providers.
//!
//! Implements [`ChatModel`] for:
//! - **gemini**: `POST /v1beta/{model}:generateContent` (needs `GOOGLE_API_KEY`).
//! - **openai**: `POST /v1/chat/completions` (needs `OPENAI_API_KEY`).
//! - **ollama**: `POST /api/generate` with `stream: false`.
//!
//! The prompt is sent as a single user turn; the reply text is returned
//! verbatim.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub use subject_tutor_core::prompt::ChatModel;

use crate::config::GenerationConfig;
use crate::embedding::{api_key, gemini_model_path};
use crate::http::{base_url, build_client, post_json, Auth};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Gemini,
    OpenAI,
    Ollama,
}

pub struct HttpChatModel {
    backend: Backend,
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_retries: u32,
}

impl HttpChatModel {
    fn new(backend: Backend, config: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
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
            temperature: config.temperature,
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
}

#[async_trait]
impl ChatModel for HttpChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.backend {
            Backend::Gemini => {
                let model = gemini_model_path(&self.model);
                let url = format!("{}/v1beta/{}:generateContent", self.url, model);
                let mut body = json!({
                    "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                });
                if let Some(t) = self.temperature {
                    body["generationConfig"] = json!({ "temperature": t });
                }
                let resp =
                    post_json(&self.client, &url, self.auth(), &body, self.max_retries, "Gemini")
                        .await?;
                parse_gemini_response(&resp)
            }
            Backend::OpenAI => {
                let url = format!("{}/v1/chat/completions", self.url);
                let mut body = json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": prompt }],
                });
                if let Some(t) = self.temperature {
                    body["temperature"] = json!(t);
                }
                let resp = post_json(
                    &self.client,
                    &url,
                    self.auth(),
                    &body,
                    self.max_retries,
                    "OpenAI",
                )
                .await?;
                parse_openai_response(&resp)
            }
            Backend::Ollama => {
                let url = format!("{}/api/generate", self.url);
                let mut body = json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                });
                if let Some(t) = self.temperature {
                    body["options"] = json!({ "temperature": t });
                }
                let resp =
                    post_json(&self.client, &url, self.auth(), &body, self.max_retries, "Ollama")
                        .await
                        .with_context(|| format!("is Ollama running at {}?", self.url))?;
                parse_ollama_response(&resp)
            }
        }
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
fn parse_gemini_response(json: &Value) -> Result<String> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow!("Gemini returned no answer ({})", reason)
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing content parts"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .concat())
}

fn parse_openai_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

fn parse_ollama_response(json: &Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
}

/// Create the configured generative model.
pub fn create_chat_model(config: &GenerationConfig) -> Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match config.provider.as_str() {
        "gemini" => Arc::new(HttpChatModel::new(
            Backend::Gemini,
            config,
            Some(api_key("GOOGLE_API_KEY")?),
        )?),
        "openai" => Arc::new(HttpChatModel::new(
            Backend::OpenAI,
            config,
            Some(api_key("OPENAI_API_KEY")?),
        )?),
        "ollama" => Arc::new(HttpChatModel::new(Backend::Ollama, config, None)?),
        other => bail!("Unknown generation provider: {}", other),
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gemini_joins_parts() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Photosynthesis " }, { "text": "makes sugar." }] }
            }]
        });
        assert_eq!(
            parse_gemini_response(&json).unwrap(),
            "Photosynthesis makes sugar."
        );
    }

    #[test]
    fn test_parse_gemini_blocked_prompt() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_openai_response() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "42" } }] });
        assert_eq!(parse_openai_response(&json).unwrap(), "42");
        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = json!({ "model": "llama3", "response": "A noun names a thing.", "done": true });
        assert_eq!(parse_ollama_response(&json).unwrap(), "A noun names a thing.");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            ..GenerationConfig::default()
        };
        let model = create_chat_model(&config).unwrap();
        assert_eq!(model.model_name(), "llama3");
    }

    #[tokio::test]
    async fn test_gemini_failure_never_shows_key() {
        let config = GenerationConfig {
            url: Some("http://127.0.0.1:9".to_string()),
            max_retries: 0,
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        let model =
            HttpChatModel::new(Backend::Gemini, &config, Some("SECRET-KEY-123".to_string()))
                .unwrap();
        let err = model.generate("What is osmosis?").await.unwrap_err();

        let rendered = crate::answer::render_failure(&crate::error::KbError::Answer(err));
        assert!(rendered.starts_with("Error generating answer: Gemini request failed"));
        assert!(!rendered.contains("SECRET-KEY-123"), "{}", rendered);
    }
}
