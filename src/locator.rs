//! Source document lookup.
//!
//! A key's document is found by trying, in order:
//!
//! 1. `<documents>/<class>/<subject_with_underscores>.docx`
//! 2. `<documents>/<subject_with_underscores>.docx`
//! 3. `<documents>/<default_document>.docx`
//!
//! The first candidate that exists wins. When none exists the last candidate
//! is still returned; the caller re-checks existence before building.

use std::path::{Path, PathBuf};

use subject_tutor_core::models::KbKey;

const DOCUMENT_EXTENSION: &str = "docx";

#[derive(Debug, Clone)]
pub struct DocumentLocator {
    root: PathBuf,
    default_document: String,
}

impl DocumentLocator {
    pub fn new(root: impl Into<PathBuf>, default_document: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_document: default_document.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate paths for `key`, most specific first. Lazily generated.
    pub fn candidates<'a>(&'a self, key: &'a KbKey) -> impl Iterator<Item = PathBuf> + 'a {
        let generators: [Box<dyn Fn() -> PathBuf + 'a>; 3] = [
            Box::new(move || {
                self.root
                    .join(key.class())
                    .join(docx_name(&key.subject_file_stem()))
            }),
            Box::new(move || self.root.join(docx_name(&key.subject_file_stem()))),
            Box::new(move || self.root.join(docx_name(&self.default_document))),
        ];
        generators.into_iter().map(|generate| generate())
    }

    /// The first existing candidate, or the default-document path.
    pub fn locate(&self, key: &KbKey) -> PathBuf {
        let mut last = None;
        for candidate in self.candidates(key) {
            if candidate.is_file() {
                return candidate;
            }
            last = Some(candidate);
        }
        last.unwrap_or_else(|| self.root.join(docx_name(&self.default_document)))
    }
}

fn docx_name(stem: &str) -> String {
    format!("{}.{}", stem, DOCUMENT_EXTENSION)
}
