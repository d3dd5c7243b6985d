//! Core data models shared by the cache, the answer service, and sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one knowledge base and one conversation log.
///
/// A key is the pair `(class, subject)`, compared by exact string match on
/// both components. Keys are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KbKey {
    class: String,
    subject: String,
}

impl KbKey {
    pub fn new(class: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            subject: subject.into(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subject name as it appears in document filenames (spaces become `_`).
    pub fn subject_file_stem(&self) -> String {
        self.subject.replace(' ', "_")
    }

    /// Returns the first component that is unusable as a single directory
    /// name, if any.
    ///
    /// Both components are used verbatim as path segments under the vector
    /// root, so empty names, `.`/`..`, and anything containing a path
    /// separator are rejected.
    pub fn invalid_component(&self) -> Option<&str> {
        [self.class.as_str(), self.subject.as_str()]
            .into_iter()
            .find(|c| !is_valid_component(c))
    }
}

fn is_valid_component(c: &str) -> bool {
    !c.trim().is_empty()
        && c != "."
        && c != ".."
        && !c.contains('/')
        && !c.contains('\\')
        && !c.contains('\0')
}

impl fmt::Display for KbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in Class {}", self.subject, self.class)
    }
}

/// A retrieved text segment with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSegment {
    /// Position of the segment in the knowledge base's segment sequence.
    pub index: usize,
    pub text: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}
