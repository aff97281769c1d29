//! Response drafting — composes a reply and saves it as a draft.

use std::sync::Arc;

use crate::error::{Error, StoreError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, prompts};
use crate::store::Store;

/// Temperature for drafting (wants some variety).
const DRAFT_TEMPERATURE: f32 = 0.7;
const DRAFT_MAX_TOKENS: u32 = 1024;

const DEFAULT_DRAFT_TONE: &str = "professional";

/// LLM-backed reply drafter. Drafts are persisted, never sent directly.
pub struct Responder {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    /// Mailbox address the reply will be sent from, if configured.
    identity: Option<String>,
}

impl Responder {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn Store>,
        identity: Option<String>,
    ) -> Self {
        Self {
            llm,
            store,
            identity,
        }
    }

    /// Draft a reply to a stored message in the requested tone and save it.
    ///
    /// Returns the draft's id and content.
    pub async fn draft(
        &self,
        message_id: &str,
        tone: Option<&str>,
    ) -> Result<(i64, String), Error> {
        let msg = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "message".into(),
                id: message_id.to_string(),
            })?;

        let tone = tone.unwrap_or(DEFAULT_DRAFT_TONE);
        let mut context = format!("Write the reply in a {tone} tone.");
        if let Some(identity) = &self.identity {
            context.push_str(&format!(" The reply is sent from {identity}."));
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::response_system_prompt()),
            ChatMessage::user(prompts::response_user_prompt(&msg, &context)),
        ])
        .with_temperature(DRAFT_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let content = response.content.trim().to_string();

        let draft_id = self.store.save_draft(message_id, &content).await?;
        Ok((draft_id, content))
    }
}
