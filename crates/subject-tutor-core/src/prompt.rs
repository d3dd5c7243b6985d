//! The tutor prompt contract and the generative model trait.
//!
//! Every answer is produced from the same template, parameterized by subject
//! and class, with three ranked instructions:
//!
//! 1. answer from the retrieved context first;
//! 2. if the context is insufficient, fall back to general knowledge only for
//!    the allow-listed domains in [`GENERAL_KNOWLEDGE_DOMAINS`];
//! 3. otherwise reply with [`REFUSAL`] verbatim.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ScoredSegment;

/// The sentence the model must return when it cannot answer.
pub const REFUSAL: &str = "I don't have enough information to answer that.";

/// Domains the model may answer from its own knowledge.
pub const GENERAL_KNOWLEDGE_DOMAINS: [&str; 3] = [
    "Basic mathematics (simple calculations, formulas)",
    "Grammar",
    "General science",
];

/// Separator placed between retrieved segments in the context block.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// A generative language model that turns a prompt into answer text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"models/gemini-1.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Join retrieved segments into the context block, best match first.
pub fn format_context(segments: &[ScoredSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render the full prompt for one question.
pub fn build_prompt(subject: &str, class: &str, context: &str, question: &str) -> String {
    let mut prompt = format!(
        "You are a helpful AI tutor for {} in Class {}. \
         Follow this priority when answering:\n\
         1. Use the provided context as the primary source.\n\
         2. If the context is insufficient or irrelevant, use your own knowledge ONLY for:\n",
        subject, class
    );
    for domain in GENERAL_KNOWLEDGE_DOMAINS {
        prompt.push_str("   - ");
        prompt.push_str(domain);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "3. If neither context nor allowed knowledge applies, respond with '{}'\n\n",
        REFUSAL
    ));
    prompt.push_str("Keep answers concise, accurate, and educational.\n\n");
    prompt.push_str(&format!(
        "Context:\n{}\n\nQuestion: {}\nAnswer:",
        context, question
    ));
    prompt
}
