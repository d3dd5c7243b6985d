//! # Subject Tutor
//!
//! A class- and subject-scoped Q&A assistant. Selecting a (class, subject)
//! key lazily loads or builds a searchable knowledge base from that key's
//! reference document; questions are answered by retrieving the most
//! relevant passages and handing them, with the question, to a generative
//! model under a fixed tutoring prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Locator  │──▶│ Chunker │──▶│ IndexBuilder │──▶│ KnowledgeStore│
//! │ .docx    │   │ 500/50  │   │ embed+index  │   │ vectorstore/ │
//! └──────────┘   └─────────┘   └──────┬───────┘   └──────────────┘
//!                                     │
//!                              ┌──────▼──────┐    ┌───────────────┐
//!                              │ IndexCache  │◀───│ AnswerService │
//!                              │ mem→disk→new│    │ prompt + LLM  │
//!                              └─────────────┘    └───────┬───────┘
//!                                                         │
//!                                   ┌─────────────────────┤
//!                                   ▼                     ▼
//!                              ┌──────────┐         ┌──────────┐
//!                              │   CLI    │         │   HTTP   │
//!                              │ (tutor)  │         │ sessions │
//!                              └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! tutor catalog                       # what can be selected
//! tutor build 9th Science             # load or build one knowledge base
//! tutor chat 9th Science              # ask away
//! tutor serve                         # HTTP API on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Knowledge base error taxonomy |
//! | [`locator`] | Source document lookup with fallbacks |
//! | [`extract`] | `.docx` paragraph extraction |
//! | [`chunk`] | Document → text segments |
//! | [`embedding`] | HTTP embedding providers |
//! | [`generation`] | HTTP generative-model providers |
//! | [`store`] | Durable per-key index storage |
//! | [`builder`] | Knowledge base construction |
//! | [`cache`] | Memory → disk → build resolution |
//! | [`answer`] | Retrieval + prompt + generation |
//! | [`session`] | Selection and per-key transcripts |
//! | [`server`] | Session HTTP API |

pub mod answer;
pub mod app;
pub mod builder;
pub mod cache;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod http;
pub mod locator;
pub mod server;
pub mod session;
pub mod store;
