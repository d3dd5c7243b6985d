//! Knowledge base error taxonomy.
//!
//! Every failure on the resolve/answer path is a [`KbError`]. Callers that
//! need to branch use [`KbError::kind`]; callers that only display use the
//! `Display` message.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidKey,
    UnknownSelection,
    Lookup,
    DocumentRead,
    EmptyDocument,
    Build,
    Load,
    Answer,
}

#[derive(Debug, Error)]
pub enum KbError {
    #[error("invalid knowledge base key component: {component:?}")]
    InvalidKey { component: String },

    #[error("{subject} is not offered for Class {class}")]
    UnknownSelection { class: String, subject: String },

    #[error("No document found for {subject} in Class {class} (last tried {})", .tried.display())]
    Lookup {
        class: String,
        subject: String,
        tried: PathBuf,
    },

    #[error("failed to read {}: {source}", .path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error("Document is empty: {}", .path.display())]
    EmptyDocument { path: PathBuf },

    #[error("failed to build knowledge base: {0:#}")]
    Build(anyhow::Error),

    #[error("failed to load knowledge base: {0:#}")]
    Load(anyhow::Error),

    #[error("{0:#}")]
    Answer(anyhow::Error),
}

impl KbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::InvalidKey { .. } => ErrorKind::InvalidKey,
            KbError::UnknownSelection { .. } => ErrorKind::UnknownSelection,
            KbError::Lookup { .. } => ErrorKind::Lookup,
            KbError::DocumentRead { .. } => ErrorKind::DocumentRead,
            KbError::EmptyDocument { .. } => ErrorKind::EmptyDocument,
            KbError::Build(_) => ErrorKind::Build,
            KbError::Load(_) => ErrorKind::Load,
            KbError::Answer(_) => ErrorKind::Answer,
        }
    }

    /// True for failures that happen while resolving a knowledge base, as
    /// opposed to while answering against a resolved one.
    pub fn is_resolution_failure(&self) -> bool {
        !matches!(self, KbError::Answer(_) | KbError::UnknownSelection { .. })
    }
}
