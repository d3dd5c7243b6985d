//! # Subject Tutor Core
//!
//! Shared, side-effect-free logic for Subject Tutor: knowledge base keys,
//! the class → subject catalog, recursive text splitting, the in-memory
//! vector index, the answer prompt contract, conversation logs, and the
//! provider traits for embedding and generation.
//!
//! This crate contains no tokio, filesystem I/O, or network code. Provider
//! implementations, durable storage, and the cache live in the
//! `subject-tutor` application crate.

pub mod catalog;
pub mod chunk;
pub mod conversation;
pub mod embedding;
pub mod index;
pub mod models;
pub mod prompt;
