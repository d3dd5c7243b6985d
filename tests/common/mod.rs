#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use subject_tutor::config::{parse_config, Config};
use subject_tutor_core::embedding::EmbeddingProvider;
use subject_tutor_core::prompt::ChatModel;

// ─── Fixtures ───────────────────────────────────────────────────────

/// Config rooted in `tmp`: documents under `documents/`, indices under
/// `vectorstore/`, default document `axonichealth`.
pub fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let content = format!(
        r#"
[paths]
documents = "{}/documents"
vectorstore = "{}/vectorstore"
default_document = "axonichealth"

[generation]
timeout_secs = 5
"#,
        root.display(),
        root.display()
    );
    let cfg = parse_config(&content).unwrap();
    cfg.validate().unwrap();
    cfg
}

/// Write a minimal `.docx` with one `<w:p>` per paragraph.
pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let body: String = paragraphs
        .iter()
        .map(|p| {
            format!(
                "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                p.replace('&', "&amp;").replace('<', "&lt;")
            )
        })
        .collect();
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    write!(
        zip,
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    )
    .unwrap();
    zip.finish().unwrap();
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Name and contents of every file directly inside `dir`.
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    file_names(dir)
        .into_iter()
        .map(|name| {
            let bytes = std::fs::read(dir.join(&name)).unwrap();
            (name, bytes)
        })
        .collect()
}

// ─── Fake providers ─────────────────────────────────────────────────

/// Deterministic letter-frequency embedder that counts its batch calls and
/// can be switched into failing.
pub struct FakeEmbedder {
    pub embed_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let e = Self::new();
        e.fail.store(true, Ordering::SeqCst);
        e
    }

    pub fn calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 27];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v[26] = 1.0;
    v
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-letters"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding quota exceeded");
        }
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding quota exceeded");
        }
        Ok(letter_vector(text))
    }
}

/// Chat model that records every prompt and replies with a fixed text.
pub struct FakeChat {
    pub prompts: Mutex<Vec<String>>,
    pub reply: String,
    pub fail: AtomicBool,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
            fail: AtomicBool::new(false),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_name(&self) -> &str {
        "fake-chat"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            bail!("model overloaded");
        }
        Ok(self.reply.clone())
    }
}
