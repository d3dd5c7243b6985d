//! Per-user session state.
//!
//! A [`Session`] holds the current (class, subject) selection and one
//! conversation log per key the user has visited. The knowledge base cache
//! is not part of the session: every session shares the process-wide
//! [`IndexCache`](crate::cache::IndexCache) through its
//! [`AnswerService`].

use std::sync::Arc;

use subject_tutor_core::catalog::Catalog;
use subject_tutor_core::conversation::{Conversations, Message, Role};
use subject_tutor_core::models::KbKey;

use crate::answer::AnswerService;
use crate::cache::ResolveStatus;
use crate::error::KbError;

pub struct Session {
    catalog: Arc<Catalog>,
    service: Arc<AnswerService>,
    current: Option<KbKey>,
    conversations: Conversations,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>, service: Arc<AnswerService>) -> Self {
        Self {
            catalog,
            service,
            current: None,
            conversations: Conversations::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current(&self) -> Option<&KbKey> {
        self.current.as_ref()
    }

    /// Switch to `(class, subject)` and make sure its knowledge base is ready.
    ///
    /// Returns how the knowledge base got into memory (see
    /// [`ResolveStatus::message`] for the status line), or `None` when it
    /// was already there. A key outside the catalog is rejected and leaves
    /// the selection unchanged; a key whose knowledge base fails to resolve
    /// stays selected, so later questions report the failure in the
    /// transcript.
    pub async fn select(
        &mut self,
        class: &str,
        subject: &str,
    ) -> Result<Option<ResolveStatus>, KbError> {
        let key = KbKey::new(class, subject);
        if !self.catalog.contains(&key) {
            return Err(KbError::UnknownSelection {
                class: class.to_string(),
                subject: subject.to_string(),
            });
        }

        self.conversations.log_mut(&key);
        self.current = Some(key.clone());
        Ok(self.service.cache().resolve(&key).await?.status)
    }

    /// Ask a question about the current selection.
    ///
    /// Records the question and the reply (an answer or an error message)
    /// in the current key's log and returns the reply. Returns `None` when
    /// nothing is selected.
    pub async fn ask(&mut self, question: &str) -> Option<String> {
        let key = self.current.clone()?;
        self.conversations
            .push(&key, Message::new(Role::User, question));

        let reply = self.service.answer(&key, question).await;
        self.conversations
            .push(&key, Message::new(Role::Assistant, reply.clone()));
        Some(reply)
    }

    /// The current key's transcript; empty when nothing is selected.
    pub fn messages(&self) -> &[Message] {
        match &self.current {
            Some(key) => self.conversations.messages(key),
            None => &[],
        }
    }

    pub fn messages_for(&self, key: &KbKey) -> &[Message] {
        self.conversations.messages(key)
    }

    /// Clear the current key's transcript.
    pub fn clear(&mut self) {
        if let Some(key) = &self.current {
            self.conversations.clear(key);
        }
    }

    pub fn clear_key(&mut self, key: &KbKey) {
        self.conversations.clear(key);
    }
}
