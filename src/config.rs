//! TOML configuration.
//!
//! Every section has defaults matching the reference deployment, so a
//! missing config file is not an error: [`load_config`] falls back to
//! [`Config::default`]. Credentials never live in the file; providers read
//! `GOOGLE_API_KEY` / `OPENAI_API_KEY` from the environment.
//!
//! ```toml
//! [paths]
//! documents = "documents"
//! vectorstore = "vectorstore"
//! default_document = "axonichealth"
//!
//! [embedding]
//! provider = "gemini"
//! model = "models/embedding-001"
//!
//! [[catalog]]
//! class = "9th"
//! subjects = ["Mathematics-1", "Mathematics-2", "Science", "English"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use subject_tutor_core::catalog::{Catalog, ClassEntry};
use subject_tutor_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use subject_tutor_core::index::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Overrides the built-in class → subjects mapping when non-empty.
    #[serde(default)]
    pub catalog: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_documents")]
    pub documents: PathBuf,
    #[serde(default = "default_vectorstore")]
    pub vectorstore: PathBuf,
    /// File stem (without `.docx`) of the last-resort document.
    #[serde(default = "default_document")]
    pub default_document: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents: default_documents(),
            vectorstore: default_vectorstore(),
            default_document: default_document(),
        }
    }
}

fn default_documents() -> PathBuf {
    PathBuf::from("documents")
}
fn default_vectorstore() -> PathBuf {
    PathBuf::from("vectorstore")
}
fn default_document() -> String {
    "axonichealth".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL override (e.g. a local Ollama or an API proxy).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            url: None,
            temperature: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "models/gemini-1.5-flash".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
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
    "127.0.0.1:8501".to_string()
}

impl Config {
    /// The configured catalog, or the built-in one if none is configured.
    pub fn catalog(&self) -> Catalog {
        if self.catalog.is_empty() {
            Catalog::default()
        } else {
            Catalog::new(self.catalog.clone())
        }
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "gemini" | "openai" | "ollama" | "disabled" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be gemini, openai, ollama, or disabled.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "gemini" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be gemini, openai, or ollama.",
                other
            ),
        }

        if self.paths.default_document.trim().is_empty() {
            bail!("paths.default_document must not be empty");
        }

        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if !seen.insert(entry.class.as_str()) {
                bail!("catalog lists class '{}' more than once", entry.class);
            }
            if entry.subjects.is_empty() {
                bail!("catalog class '{}' has no subjects", entry.class);
            }
        }

        Ok(())
    }
}

/// Load and validate the config at `path`.
///
/// A file that does not exist yields the defaults; a file that exists but
/// cannot be read or parsed is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Parse config text without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
