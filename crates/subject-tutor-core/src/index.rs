//! In-memory vector index over a knowledge base's text segments.
//!
//! A [`VectorIndex`] pairs the Text Segment Sequence with one embedding per
//! segment and answers nearest-neighbour queries by brute-force cosine
//! similarity. Indices are immutable once constructed, so a resolved index
//! can be shared behind an `Arc` and read without locking.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use crate::embedding::cosine_similarity;
use crate::models::ScoredSegment;

/// Number of segments retrieved per question when no count is given.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    segments: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from parallel segment and vector sequences.
    ///
    /// # Errors
    ///
    /// Fails if the sequences differ in length, the index would be empty,
    /// or the vectors do not all share one non-zero dimensionality.
    pub fn new(
        model: impl Into<String>,
        segments: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if segments.len() != vectors.len() {
            bail!(
                "segment/vector count mismatch: {} segments, {} vectors",
                segments.len(),
                vectors.len()
            );
        }
        let dims = match vectors.first() {
            Some(v) if !v.is_empty() => v.len(),
            Some(_) => bail!("embedding vectors must not be empty"),
            None => bail!("cannot build an index without segments"),
        };
        if let Some(pos) = vectors.iter().position(|v| v.len() != dims) {
            bail!(
                "vector {} has {} dimensions, expected {}",
                pos,
                vectors[pos].len(),
                dims
            );
        }

        Ok(Self {
            model: model.into(),
            dims,
            segments,
            vectors,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// SHA-256 of the segment sequence, used to pair persisted vectors with
    /// the segments they were computed from.
    pub fn segments_digest(&self) -> String {
        segments_digest(&self.segments)
    }

    /// Return the `k` segments most similar to `query`, best first.
    ///
    /// Ties keep segment order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredSegment> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(index, score)| ScoredSegment {
                index,
                text: self.segments[index].clone(),
                score,
            })
            .collect()
    }
}

/// Hex SHA-256 over the segments, length-prefixed so that different splits
/// of the same text hash differently.
pub fn segments_digest(segments: &[String]) -> String {
    let mut hasher = Sha256::new();
    for s in segments {
        hasher.update((s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
