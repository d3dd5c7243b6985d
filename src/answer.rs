//! Question answering against a resolved knowledge base.
//!
//! [`AnswerService::ask`] is the structured entry point and returns a
//! [`KbError`] on failure. [`AnswerService::answer`] wraps it for chat
//! surfaces: it never fails and renders every error as the text of the
//! assistant's reply.

use std::sync::Arc;
use std::time::Duration;

use subject_tutor_core::models::{KbKey, ScoredSegment};
use subject_tutor_core::prompt::{build_prompt, format_context, ChatModel};

use crate::cache::{IndexCache, ResolveStatus};
use crate::error::KbError;

/// Reply used when the key's knowledge base cannot be resolved.
pub const KB_UNAVAILABLE: &str =
    "Error: Could not load knowledge base. Please check if documents exist.";

/// A generated answer and the segments it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredSegment>,
    /// Set when answering had to load or build the knowledge base first.
    pub status: Option<ResolveStatus>,
}

pub struct AnswerService {
    cache: Arc<IndexCache>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
    timeout: Duration,
}

impl AnswerService {
    pub fn new(
        cache: Arc<IndexCache>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            model,
            top_k: top_k.max(1),
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Answer `question` from `key`'s knowledge base.
    pub async fn ask(&self, key: &KbKey, question: &str) -> Result<Answer, KbError> {
        let resolved = self.cache.resolve(key).await?;

        let query = self
            .cache
            .builder()
            .embedder()
            .embed_query(question)
            .await
            .map_err(|e| KbError::Answer(e.context("failed to embed question")))?;
        let sources = resolved.index.search(&query, self.top_k);

        let prompt = build_prompt(
            key.subject(),
            key.class(),
            &format_context(&sources),
            question,
        );
        tracing::debug!(
            class = key.class(),
            subject = key.subject(),
            retrieved = sources.len(),
            model = self.model.model_name(),
            "generating answer"
        );

        let text = tokio::time::timeout(self.timeout, self.model.generate(&prompt))
            .await
            .map_err(|_| {
                KbError::Answer(anyhow::anyhow!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(KbError::Answer)?;

        Ok(Answer {
            text,
            sources,
            status: resolved.status,
        })
    }

    /// Answer `question`, turning any failure into a displayable reply.
    pub async fn answer(&self, key: &KbKey, question: &str) -> String {
        match self.ask(key, question).await {
            Ok(answer) => answer.text,
            Err(e) => {
                tracing::warn!(
                    class = key.class(),
                    subject = key.subject(),
                    kind = ?e.kind(),
                    error = %e,
                    "answer failed"
                );
                render_failure(&e)
            }
        }
    }
}

/// The user-facing reply for a failed [`AnswerService::ask`].
pub fn render_failure(err: &KbError) -> String {
    if err.is_resolution_failure() {
        KB_UNAVAILABLE.to_string()
    } else {
        format!("Error generating answer: {}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    #[test]
    fn test_resolution_failures_render_fixed_message() {
        let err = KbError::Lookup {
            class: "12th".into(),
            subject: "Biology".into(),
            tried: PathBuf::from("documents/axonichealth.docx"),
        };
        assert_eq!(render_failure(&err), KB_UNAVAILABLE);
        assert_eq!(
            render_failure(&KbError::Build(anyhow!("quota exceeded"))),
            KB_UNAVAILABLE
        );
    }

    #[test]
    fn test_answer_failure_embeds_cause() {
        let msg = render_failure(&KbError::Answer(anyhow!("model overloaded")));
        assert_eq!(msg, "Error generating answer: model overloaded");
    }
}
