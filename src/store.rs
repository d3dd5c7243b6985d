//! Durable knowledge base storage.
//!
//! Each key owns one directory, `<vectorstore>/<class>/<subject>/`:
//!
//! | File | Contents |
//! |------|----------|
//! | `vectors.bin` | little-endian `f32` matrix, one row per segment |
//! | `segments.json` | the raw Text Segment Sequence |
//! | `manifest.json` | [`Manifest`]; written last, marks the index complete |
//!
//! [`KnowledgeStore::persist`] writes into a hidden sibling staging
//! directory and only swaps it into place once every file is on disk, so a
//! reader never sees a half-written index and a failed write leaves the
//! previous build untouched.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use subject_tutor_core::embedding::{blob_to_vec, vec_to_blob};
use subject_tutor_core::index::{segments_digest, VectorIndex};
use subject_tutor_core::models::KbKey;

pub const FORMAT_VERSION: u32 = 1;

const VECTORS_FILE: &str = "vectors.bin";
const SEGMENTS_FILE: &str = "segments.json";
const MANIFEST_FILE: &str = "manifest.json";
const STAGING_MARKER: &str = ".staging-";

/// Metadata describing one persisted build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model: String,
    pub dims: usize,
    pub segments: usize,
    pub segments_sha256: String,
    pub built_at: DateTime<Utc>,
    pub source: PathBuf,
}

/// A persisted knowledge base found by [`KnowledgeStore::list`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredIndex {
    pub class: String,
    pub subject: String,
    pub manifest: Manifest,
}

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    root: PathBuf,
}

impl KnowledgeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The deterministic directory for `key`.
    pub fn dir_for(&self, key: &KbKey) -> PathBuf {
        self.root.join(key.class()).join(key.subject())
    }

    /// Whether a complete index is persisted for `key`.
    pub fn exists(&self, key: &KbKey) -> bool {
        self.dir_for(key).join(MANIFEST_FILE).is_file()
    }

    /// Write `index` as the sole persisted build for `key`, replacing any
    /// previous one.
    pub fn persist(&self, key: &KbKey, index: &VectorIndex, source: &Path) -> Result<Manifest> {
        let target = self.dir_for(key);
        let parent = target
            .parent()
            .with_context(|| format!("no parent directory for {}", target.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let staging = parent.join(format!(
            ".{}{}{}",
            key.subject(),
            STAGING_MARKER,
            uuid::Uuid::new_v4().simple()
        ));

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: index.model().to_string(),
            dims: index.dims(),
            segments: index.len(),
            segments_sha256: index.segments_digest(),
            built_at: Utc::now(),
            source: source.to_path_buf(),
        };

        if let Err(e) = write_build(&staging, index, &manifest) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if target.exists() {
            if let Err(e) = fs::remove_dir_all(&target) {
                let _ = fs::remove_dir_all(&staging);
                return Err(e)
                    .with_context(|| format!("Failed to remove old index {}", target.display()));
            }
        }
        fs::rename(&staging, &target).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                staging.display(),
                target.display()
            )
        })?;

        tracing::debug!(
            class = key.class(),
            subject = key.subject(),
            dir = %target.display(),
            segments = manifest.segments,
            "knowledge base persisted"
        );
        Ok(manifest)
    }

    /// Read the persisted index for `key`, checking it was produced by
    /// `model` and that its files agree with each other.
    pub fn load(&self, key: &KbKey, model: &str) -> Result<VectorIndex> {
        let dir = self.dir_for(key);
        let manifest = read_manifest(&dir)?;

        if manifest.format_version != FORMAT_VERSION {
            bail!(
                "unsupported format version {} (expected {})",
                manifest.format_version,
                FORMAT_VERSION
            );
        }
        if manifest.model != model {
            bail!(
                "index was built with '{}', active embedding model is '{}'",
                manifest.model,
                model
            );
        }

        let segments_path = dir.join(SEGMENTS_FILE);
        let segments: Vec<String> = serde_json::from_slice(
            &fs::read(&segments_path)
                .with_context(|| format!("Failed to read {}", segments_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", segments_path.display()))?;
        if segments.len() != manifest.segments {
            bail!(
                "manifest lists {} segments, found {}",
                manifest.segments,
                segments.len()
            );
        }
        if segments_digest(&segments) != manifest.segments_sha256 {
            bail!("segment checksum mismatch");
        }

        if manifest.dims == 0 {
            bail!("manifest lists zero dimensions");
        }
        let vectors_path = dir.join(VECTORS_FILE);
        let blob = fs::read(&vectors_path)
            .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
        let row_bytes = manifest.dims.checked_mul(4);
        let expected = row_bytes.and_then(|row| row.checked_mul(manifest.segments));
        let (Some(row_bytes), Some(expected)) = (row_bytes, expected) else {
            bail!(
                "manifest size {} x {} overflows",
                manifest.segments,
                manifest.dims
            );
        };
        if blob.len() != expected {
            bail!(
                "{} is {} bytes, expected {}",
                VECTORS_FILE,
                blob.len(),
                expected
            );
        }
        let vectors = blob
            .chunks_exact(row_bytes)
            .map(blob_to_vec)
            .collect();

        VectorIndex::new(manifest.model, segments, vectors)
    }

    /// Every complete knowledge base under the root, sorted by key.
    pub fn list(&self) -> Result<Vec<StoredIndex>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let subject = entry.file_name().to_string_lossy().to_string();
            if subject.starts_with('.') {
                continue;
            }
            let class = match entry.path().parent().and_then(|p| p.file_name()) {
                Some(c) => c.to_string_lossy().to_string(),
                None => continue,
            };
            if !entry.path().join(MANIFEST_FILE).is_file() {
                continue;
            }
            match read_manifest(entry.path()) {
                Ok(manifest) => found.push(StoredIndex {
                    class,
                    subject,
                    manifest,
                }),
                Err(e) => {
                    tracing::warn!(dir = %entry.path().display(), error = %e, "unreadable manifest")
                }
            }
        }
        Ok(found)
    }
}

fn write_build(dir: &Path, index: &VectorIndex, manifest: &Manifest) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut blob = Vec::with_capacity(index.len() * index.dims() * 4);
    for v in index.vectors() {
        blob.extend_from_slice(&vec_to_blob(v));
    }
    fs::write(dir.join(VECTORS_FILE), blob).context("Failed to write vectors")?;

    fs::write(
        dir.join(SEGMENTS_FILE),
        serde_json::to_vec(index.segments())?,
    )
    .context("Failed to write segments")?;

    fs::write(
        dir.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(manifest)?,
    )
    .context("Failed to write manifest")?;
    Ok(())
}

fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes =
        fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}
