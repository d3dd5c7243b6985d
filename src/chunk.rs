//! Document → Text Segment Sequence.
//!
//! Reads a `.docx` file, keeps its non-blank paragraphs joined by newlines,
//! and splits the result with the recursive splitter from
//! [`subject_tutor_core::chunk`].

use std::path::Path;

use subject_tutor_core::chunk::split_text;

use crate::config::ChunkingConfig;
use crate::error::KbError;
use crate::extract::read_docx_paragraphs;

/// Extract and split the document at `path`.
///
/// # Errors
///
/// - [`KbError::DocumentRead`] if the file cannot be read or parsed.
/// - [`KbError::EmptyDocument`] if every paragraph is blank.
pub fn load_and_chunk(path: &Path, config: &ChunkingConfig) -> Result<Vec<String>, KbError> {
    let paragraphs = read_docx_paragraphs(path).map_err(|source| KbError::DocumentRead {
        path: path.to_path_buf(),
        source,
    })?;

    let text = join_paragraphs(&paragraphs);
    if text.trim().is_empty() {
        return Err(KbError::EmptyDocument {
            path: path.to_path_buf(),
        });
    }

    let segments = split_text(&text, config.chunk_size, config.chunk_overlap);
    tracing::debug!(
        path = %path.display(),
        paragraphs = paragraphs.len(),
        segments = segments.len(),
        "document split"
    );
    Ok(segments)
}

/// Join non-blank paragraphs with `\n`.
pub fn join_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}
