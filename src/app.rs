//! Wiring from [`Config`] to the running services.
//!
//! The provider-free constructors ([`Tutor::with_providers`]) are what tests
//! and embedders of the library use; [`Tutor::from_config`] additionally
//! creates the HTTP providers named in the config.

use anyhow::Result;
use std::sync::Arc;

use subject_tutor_core::catalog::Catalog;
use subject_tutor_core::embedding::EmbeddingProvider;
use subject_tutor_core::prompt::ChatModel;

use crate::answer::AnswerService;
use crate::builder::IndexBuilder;
use crate::cache::IndexCache;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::generation::create_chat_model;
use crate::http::retry_budget;
use crate::server::AppState;
use crate::session::Session;

/// One process-wide tutor: the catalog plus the answer service that owns
/// the shared knowledge base cache.
#[derive(Clone)]
pub struct Tutor {
    catalog: Arc<Catalog>,
    service: Arc<AnswerService>,
}

impl Tutor {
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let model = create_chat_model(&config.generation)?;
        Ok(Self::with_providers(config, embedder, model))
    }

    pub fn with_providers(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let cache = Arc::new(index_cache(config, embedder));
        let service = AnswerService::new(
            cache,
            model,
            config.retrieval.top_k,
            retry_budget(config.generation.timeout_secs, config.generation.max_retries),
        );
        Self {
            catalog: Arc::new(config.catalog()),
            service: Arc::new(service),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn service(&self) -> &Arc<AnswerService> {
        &self.service
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        self.service.cache()
    }

    /// A fresh session sharing this tutor's cache.
    pub fn session(&self) -> Session {
        Session::new(self.catalog.clone(), self.service.clone())
    }

    pub fn server_state(&self) -> AppState {
        AppState::new(self.catalog.clone(), self.service.clone())
    }
}

/// A cache over the configured document and vector roots.
pub fn index_cache(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> IndexCache {
    IndexCache::new(IndexBuilder::from_config(config, embedder))
}
