//! Process-wide knowledge base cache.
//!
//! [`IndexCache::resolve`] decides, for one key, between:
//!
//! 1. the in-memory entry, if any (no work, no status);
//! 2. the durable index, if a complete one exists and loads ("loaded");
//! 3. a fresh build ("created").
//!
//! A durable index that fails to load is logged and rebuilt rather than
//! reported. Every key's decision runs under that key's own async mutex,
//! so two callers can never build or persist the same key at once, and
//! different keys never wait on each other.
//!
//! Entries are never evicted.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use subject_tutor_core::index::VectorIndex;
use subject_tutor_core::models::KbKey;

use crate::builder::IndexBuilder;
use crate::error::KbError;

/// How a key's index was obtained on first resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStatus {
    Loaded,
    Created,
}

impl ResolveStatus {
    /// The line shown to the user after a selection resolves.
    pub fn message(self, key: &KbKey) -> String {
        match self {
            ResolveStatus::Created => format!("Created new knowledge base for {}", key),
            ResolveStatus::Loaded => format!("Loaded existing knowledge base for {}", key),
        }
    }
}

impl fmt::Display for ResolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolveStatus::Loaded => "loaded",
            ResolveStatus::Created => "created",
        })
    }
}

/// A resolved index plus how it got into memory. `status` is `None` when it
/// was already cached.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub index: Arc<VectorIndex>,
    pub status: Option<ResolveStatus>,
}

pub struct IndexCache {
    builder: IndexBuilder,
    memory: RwLock<HashMap<KbKey, Arc<VectorIndex>>>,
    locks: Mutex<HashMap<KbKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl IndexCache {
    pub fn new(builder: IndexBuilder) -> Self {
        Self {
            builder,
            memory: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn builder(&self) -> &IndexBuilder {
        &self.builder
    }

    /// The cached index for `key`, without loading or building.
    pub fn get(&self, key: &KbKey) -> Option<Arc<VectorIndex>> {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of keys currently held in memory.
    pub fn len(&self) -> usize {
        self.memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the index for `key`, loading or building it on first use.
    pub async fn resolve(&self, key: &KbKey) -> Result<Resolved, KbError> {
        check_key(key)?;

        if let Some(index) = self.get(key) {
            return Ok(Resolved {
                index,
                status: None,
            });
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        // Another caller may have finished while we waited.
        if let Some(index) = self.get(key) {
            return Ok(Resolved {
                index,
                status: None,
            });
        }

        let store = self.builder.store();
        if store.exists(key) {
            match store.load(key, self.builder.embedder().model_name()) {
                Ok(index) => {
                    tracing::info!(
                        class = key.class(),
                        subject = key.subject(),
                        segments = index.len(),
                        "loaded knowledge base"
                    );
                    return Ok(Resolved {
                        index: self.insert(key, index),
                        status: Some(ResolveStatus::Loaded),
                    });
                }
                Err(e) => {
                    let err = KbError::Load(e);
                    tracing::warn!(
                        class = key.class(),
                        subject = key.subject(),
                        error = %err,
                        "persisted knowledge base unusable, rebuilding"
                    );
                }
            }
        }

        let index = self.builder.build(key).await?;
        Ok(Resolved {
            index: self.insert(key, index),
            status: Some(ResolveStatus::Created),
        })
    }

    /// Rebuild `key` from its current source document, replacing both the
    /// durable and the in-memory index.
    ///
    /// On failure the previous index (if any) stays in place.
    pub async fn rebuild(&self, key: &KbKey) -> Result<Arc<VectorIndex>, KbError> {
        check_key(key)?;

        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let index = self.builder.build(key).await?;
        Ok(self.insert(key, index))
    }

    fn insert(&self, key: &KbKey, index: VectorIndex) -> Arc<VectorIndex> {
        let index = Arc::new(index);
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), Arc::clone(&index));
        index
    }

    fn key_lock(&self, key: &KbKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

fn check_key(key: &KbKey) -> Result<(), KbError> {
    match key.invalid_component() {
        Some(component) => Err(KbError::InvalidKey {
            component: component.to_string(),
        }),
        None => Ok(()),
    }
}
