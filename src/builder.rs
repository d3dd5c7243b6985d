//! Knowledge base construction.
//!
//! Builds one key's index from scratch: locate the source document, split
//! it, embed every segment, and persist the result as the key's only
//! durable build.

use std::sync::Arc;
use std::time::Instant;

use subject_tutor_core::embedding::EmbeddingProvider;
use subject_tutor_core::index::VectorIndex;
use subject_tutor_core::models::KbKey;

use crate::chunk::load_and_chunk;
use crate::config::{ChunkingConfig, Config};
use crate::error::KbError;
use crate::locator::DocumentLocator;
use crate::store::KnowledgeStore;

#[derive(Clone)]
pub struct IndexBuilder {
    locator: DocumentLocator,
    chunking: ChunkingConfig,
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexBuilder {
    pub fn new(
        locator: DocumentLocator,
        chunking: ChunkingConfig,
        store: KnowledgeStore,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            locator,
            chunking,
            store,
            embedder,
        }
    }

    /// Wire a builder from the `[paths]` and `[chunking]` config sections.
    pub fn from_config(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(
            DocumentLocator::new(&config.paths.documents, &config.paths.default_document),
            config.chunking.clone(),
            KnowledgeStore::new(&config.paths.vectorstore),
            embedder,
        )
    }

    pub fn locator(&self) -> &DocumentLocator {
        &self.locator
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Build and persist the index for `key`.
    ///
    /// Nothing is written unless every step up to persistence succeeds, so a
    /// failed build leaves any previous durable index in place.
    pub async fn build(&self, key: &KbKey) -> Result<VectorIndex, KbError> {
        let start = Instant::now();
        let source = self.locator.locate(key);
        if !source.is_file() {
            return Err(KbError::Lookup {
                class: key.class().to_string(),
                subject: key.subject().to_string(),
                tried: source,
            });
        }

        let segments = load_and_chunk(&source, &self.chunking)?;
        tracing::info!(
            class = key.class(),
            subject = key.subject(),
            source = %source.display(),
            segments = segments.len(),
            "building knowledge base"
        );

        let vectors = self
            .embedder
            .embed(&segments)
            .await
            .map_err(|e| KbError::Build(e.context("embedding request failed")))?;

        let index = VectorIndex::new(self.embedder.model_name(), segments, vectors)
            .map_err(KbError::Build)?;

        self.store
            .persist(key, &index, &source)
            .map_err(KbError::Build)?;

        tracing::info!(
            class = key.class(),
            subject = key.subject(),
            segments = index.len(),
            dims = index.dims(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "knowledge base built"
        );
        Ok(index)
    }
}
