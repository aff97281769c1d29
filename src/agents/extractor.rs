//! Action item extraction — pulls tasks, deadlines, and people out of a
//! message and persists them.
//!
//! Like classification, model output is parsed strictly; a malformed
//! reply degrades to an empty action list rather than an error.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, StoreError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object, prompts};
use crate::model::{ActionPriority, NewAction};
use crate::store::Store;

/// Temperature for extraction calls.
const EXTRACT_TEMPERATURE: f32 = 0.3;
const EXTRACT_MAX_TOKENS: u32 = 1024;

/// LLM-backed action extractor.
pub struct Extractor {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Store>) -> Self {
        Self { llm, store }
    }

    /// Extract action items from a stored message and persist each one.
    ///
    /// Returns the inserted actions with their ids. A reply the model
    /// garbles yields an empty list, not an error.
    pub async fn extract(&self, message_id: &str) -> Result<Vec<(i64, NewAction)>, Error> {
        let msg = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "message".into(),
                id: message_id.to_string(),
            })?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::action_extraction_system_prompt()),
            ChatMessage::user(prompts::action_extraction_user_prompt(&msg)),
        ])
        .with_temperature(EXTRACT_TEMPERATURE)
        .with_max_tokens(EXTRACT_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let actions = parse_actions_reply(&response.content, message_id);
        if actions.is_none() {
            warn!(
                id = %message_id,
                raw = %response.content.chars().take(200).collect::<String>(),
                "Unparseable action extraction reply, no actions recorded"
            );
        }

        let mut inserted = Vec::new();
        for action in actions.unwrap_or_default() {
            let id = self.store.insert_action(&action).await?;
            inserted.push((id, action));
        }
        Ok(inserted)
    }
}

#[derive(Deserialize)]
struct ActionsReply {
    #[serde(default)]
    actions: Vec<ActionReply>,
}

#[derive(Deserialize)]
struct ActionReply {
    #[serde(default)]
    description: String,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    people: Vec<String>,
}

/// Parse the extraction reply into actions; `None` means unparseable.
///
/// Entries with an empty description are dropped; an unparseable
/// deadline becomes no deadline.
pub fn parse_actions_reply(raw: &str, message_id: &str) -> Option<Vec<NewAction>> {
    let json = extract_json_object(raw);
    let reply: ActionsReply = serde_json::from_str(&json).ok()?;

    let actions = reply
        .actions
        .into_iter()
        .filter(|a| !a.description.trim().is_empty())
        .map(|a| NewAction {
            message_id: message_id.to_string(),
            description: a.description.trim().to_string(),
            deadline: a
                .deadline
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            priority: a
                .priority
                .map(|p| ActionPriority::parse_lenient(&p))
                .unwrap_or_default(),
            people: a.people,
        })
        .collect();
    Some(actions)
}
