//! CLI command implementations.
//!
//! Each `run_*` function backs one `tutor` subcommand and prints to stdout;
//! diagnostics go through `tracing` to stderr.

use anyhow::{bail, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use subject_tutor_core::conversation::Role;
use subject_tutor_core::models::KbKey;

use crate::app::{index_cache, Tutor};
use crate::config::Config;
use crate::embedding::create_provider;
use crate::locator::DocumentLocator;
use crate::store::KnowledgeStore;

pub fn run_catalog(config: &Config) -> Result<()> {
    let catalog = config.catalog();
    println!("{:<8} SUBJECTS", "CLASS");
    for entry in catalog.entries() {
        println!("{:<8} {}", entry.class, entry.subjects.join(", "));
    }
    Ok(())
}

/// Print every candidate path for the key and which one would be used.
pub fn run_locate(config: &Config, class: &str, subject: &str) -> Result<()> {
    let key = KbKey::new(class, subject);
    let locator = DocumentLocator::new(&config.paths.documents, &config.paths.default_document);
    let chosen = locator.locate(&key);

    for candidate in locator.candidates(&key) {
        let marker = if candidate == chosen { "*" } else { " " };
        let state = if candidate.is_file() { "found" } else { "missing" };
        println!("{} {:<8} {}", marker, state, candidate.display());
    }
    if !chosen.is_file() {
        bail!("No document found for {}", key);
    }
    Ok(())
}

pub fn run_list(config: &Config) -> Result<()> {
    let store = KnowledgeStore::new(&config.paths.vectorstore);
    let stored = store.list()?;
    if stored.is_empty() {
        println!("No knowledge bases in {}.", store.root().display());
        return Ok(());
    }

    println!(
        "{:<8} {:<16} {:>8}  {:<24} BUILT",
        "CLASS", "SUBJECT", "SEGMENTS", "MODEL"
    );
    for s in stored {
        println!(
            "{:<8} {:<16} {:>8}  {:<24} {}",
            s.class,
            s.subject,
            s.manifest.segments,
            s.manifest.model,
            s.manifest.built_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Resolve the key's knowledge base, or rebuild it with `force`.
pub async fn run_build(config: &Config, class: &str, subject: &str, force: bool) -> Result<()> {
    let key = KbKey::new(class, subject);
    let cache = index_cache(config, create_provider(&config.embedding)?);

    if force {
        let index = cache.rebuild(&key).await?;
        println!(
            "Rebuilt knowledge base for {} ({} segments)",
            key,
            index.len()
        );
        return Ok(());
    }

    let resolved = cache.resolve(&key).await?;
    match resolved.status {
        Some(status) => println!("{} ({} segments)", status.message(&key), resolved.index.len()),
        None => println!("Knowledge base for {} is ready", key),
    }
    Ok(())
}

/// Answer one question and print the reply.
pub async fn run_ask(config: &Config, class: &str, subject: &str, question: &str) -> Result<()> {
    let tutor = Tutor::from_config(config)?;
    let mut session = tutor.session();

    match session.select(class, subject).await {
        Ok(Some(status)) => eprintln!("{}", status.message(&KbKey::new(class, subject))),
        Ok(None) => {}
        // Still selected: the reply below carries the failure.
        Err(e) if e.is_resolution_failure() => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(reply) = session.ask(question).await {
        println!("{}", reply);
    }
    Ok(())
}

/// Interactive chat for one key. `/clear` empties the transcript and
/// `/quit` (or EOF) exits.
pub async fn run_chat(config: &Config, class: &str, subject: &str) -> Result<()> {
    let tutor = Tutor::from_config(config)?;
    let mut session = tutor.session();
    let key = KbKey::new(class, subject);

    println!("Q&A: {} for Class {}", subject, class);
    match session.select(class, subject).await {
        Ok(Some(status)) => println!("{}", status.message(&key)),
        Ok(None) => {}
        Err(e) if e.is_resolution_failure() => eprintln!("Error creating knowledge base: {}", e),
        Err(e) => return Err(e.into()),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("(chat cleared)");
            }
            "/history" => {
                for m in session.messages() {
                    let who = match m.role {
                        Role::User => "you",
                        Role::Assistant => "tutor",
                    };
                    println!("[{}] {}: {}", m.at.format("%H:%M:%S"), who, m.content);
                }
            }
            question => {
                if let Some(reply) = session.ask(question).await {
                    println!("{}\n", reply);
                }
            }
        }
    }
    Ok(())
}
