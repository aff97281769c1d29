//! Email summarization — single messages and whole threads.

use std::sync::Arc;

use crate::error::{Error, StoreError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, prompts};

use crate::store::Store;

/// Temperature for summarization calls.
const SUMMARY_TEMPERATURE: f32 = 0.5;
/// Max tokens for a summary (the prompt asks for under 150 words).
const SUMMARY_MAX_TOKENS: u32 = 512;

/// LLM-backed summarizer. Message summaries are written back to the store.
pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Store>) -> Self {
        Self { llm, store }
    }

    /// Summarize a stored message and persist the summary on it.
    pub async fn summarize(&self, message_id: &str) -> Result<String, Error> {
        let msg = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "message".into(),
                id: message_id.to_string(),
            })?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::summarization_system_prompt()),
            ChatMessage::user(prompts::summarization_user_prompt(&msg)),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let summary = response.content.trim().to_string();

        self.store.set_summary(message_id, &summary).await?;
        Ok(summary)
    }

    /// Summarize every stored message in a thread, oldest first.
    ///
    /// Thread summaries are transient and not written back.
    pub async fn summarize_thread(&self, thread_id: &str) -> Result<String, Error> {
        let messages = self.store.list_thread(thread_id).await?;
        if messages.is_empty() {
            return Err(StoreError::NotFound {
                entity: "thread".into(),
                id: thread_id.to_string(),
            }
            .into());
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::summarization_system_prompt()),
            ChatMessage::user(prompts::thread_summary_user_prompt(&messages)),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use crate::error::LlmError;
    use crate::llm::Completion;
    use crate::model::EmailMessage;
    use crate::store::LibSqlStore;

    struct StubLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            Ok(Completion {
                content: self.reply.clone(),
            })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn sample_message(id: &str, thread_id: &str) -> EmailMessage {
        EmailMessage {
            id: id.into(),
            thread_id: thread_id.into(),
            subject: "Budget question".into(),
            sender: "bob@example.com".into(),
            recipient: "me@example.com".into(),
            body: "How much is left in Q3?".into(),
            received_at: Utc.with_ymd_and_hms(2026, 2, 8, 10, 0, 0).unwrap(),
            classification: None,
            summary: None,
        }
    }

    #[tokio::test]
    async fn summarize_writes_back_to_store() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store
            .upsert_message(&sample_message("m1", "t1"))
            .await
            .unwrap();

        let llm = Arc::new(StubLlm {
            reply: "  Bob asks about the Q3 budget.  ".into(),
        });
        let summarizer = Summarizer::new(llm, store.clone());

        let summary = summarizer.summarize("m1").await.unwrap();
        assert_eq!(summary, "Bob asks about the Q3 budget.");

        let stored = store.get_message("m1").await.unwrap().unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Bob asks about the Q3 budget."));
    }

    #[tokio::test]
    async fn summarize_missing_message_is_not_found() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let summarizer = Summarizer::new(Arc::new(StubLlm { reply: "x".into() }), store);

        let err = summarizer.summarize("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn summarize_empty_thread_is_not_found() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let summarizer = Summarizer::new(Arc::new(StubLlm { reply: "x".into() }), store);

        let err = summarizer.summarize_thread("t-empty").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn summarize_thread_uses_all_messages() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store
            .upsert_message(&sample_message("m1", "t1"))
            .await
            .unwrap();
        store
            .upsert_message(&sample_message("m2", "t1"))
            .await
            .unwrap();

        let summarizer = Summarizer::new(
            Arc::new(StubLlm {
                reply: "Thread about the Q3 budget.".into(),
            }),
            store,
        );

        let summary = summarizer.summarize_thread("t1").await.unwrap();
        assert_eq!(summary, "Thread about the Q3 budget.");
    }
}
