//! End-to-end tests over the public API: stubbed mail source and model
//! provider, real in-memory store.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use inbox_agent::error::{LlmError, MailError};
use inbox_agent::llm::{Completion, CompletionRequest, LlmProvider};
use inbox_agent::mail::MailSource;
use inbox_agent::model::{ActionPriority, Category, EmailMessage, NewAction, Sentiment};
use inbox_agent::pipeline::{FetchOptions, Pipeline};
use inbox_agent::store::{LibSqlStore, Store};

struct StubMail {
    messages: Vec<EmailMessage>,
}

#[async_trait]
impl MailSource for StubMail {
    async fn authenticate(&self) -> Result<(), MailError> {
        Ok(())
    }

    async fn fetch_recent(
        &self,
        max_results: usize,
        _query: Option<&str>,
    ) -> Result<Vec<EmailMessage>, MailError> {
        Ok(self.messages.iter().take(max_results).cloned().collect())
    }

    async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<String, MailError> {
        if to.is_empty() {
            return Err(MailError::Send("empty recipient".into()));
        }
        Ok("provider-sent-id".into())
    }
}

struct StubLlm {
    replies: Mutex<Vec<Result<String, LlmError>>>,
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
        let next = self.replies.lock().unwrap().remove(0);
        next.map(|content| Completion { content })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn message(id: &str) -> EmailMessage {
    EmailMessage {
        id: id.into(),
        thread_id: format!("t-{id}"),
        subject: format!("Subject {id}"),
        sender: "alice@example.com".into(),
        recipient: "me@example.com".into(),
        body: "Please review by Friday.".into(),
        received_at: Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap(),
        classification: None,
        summary: None,
    }
}

fn work_replies() -> Vec<Result<String, LlmError>> {
    vec![
        Ok(r#"{"category": "WORK", "priority": 6, "reasoning": "review request"}"#.into()),
        Ok(r#"{"sentiment": "neutral", "urgency": 4, "tone": "professional"}"#.into()),
    ]
}

fn build_pipeline(
    messages: Vec<EmailMessage>,
    replies: Vec<Result<String, LlmError>>,
    store: Arc<LibSqlStore>,
) -> Pipeline {
    Pipeline::new(
        Arc::new(StubMail { messages }),
        Arc::new(StubLlm {
            replies: Mutex::new(replies),
        }),
        store,
        Arc::new(AtomicBool::new(false)),
    )
}

#[tokio::test]
async fn end_to_end_fetch_classify_store() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let pipeline = build_pipeline(vec![message("m1")], work_replies(), store.clone());

    let report = pipeline
        .fetch_and_process(&FetchOptions {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.processed_ids, vec!["m1".to_string()]);

    let stored = store.get_message("m1").await.unwrap().unwrap();
    let c = stored.classification.unwrap();
    assert_eq!(c.category, Category::Work);
    assert_eq!(c.priority, 6);
    assert_eq!(c.sentiment, Sentiment::Neutral);
    assert_eq!(c.urgency, 4);
    assert_eq!(c.tone, "professional");
}

#[tokio::test]
async fn refetching_the_same_message_keeps_a_single_row() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());

    let first = build_pipeline(vec![message("m1")], work_replies(), store.clone());
    first
        .fetch_and_process(&FetchOptions {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    // Second run sees the same message again; no model calls are needed.
    let second = build_pipeline(vec![message("m1")], vec![], store.clone());
    let report = second
        .fetch_and_process(&FetchOptions {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(store.list_recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_failing_message_does_not_poison_the_batch() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());

    // m1 classifies fine, m2's calls fail, m3 classifies fine.
    let mut replies = work_replies();
    replies.push(Err(LlmError::RateLimited));
    replies.push(Ok("unused".into()));
    replies.extend(work_replies());

    let pipeline = build_pipeline(
        vec![message("m1"), message("m2"), message("m3")],
        replies,
        store.clone(),
    );
    let report = pipeline
        .fetch_and_process(&FetchOptions {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);

    // The failed message is stored, just without classification.
    let m2 = store.get_message("m2").await.unwrap().unwrap();
    assert!(m2.classification.is_none());
    assert!(store.get_message("m1").await.unwrap().unwrap().classification.is_some());
    assert!(store.get_message("m3").await.unwrap().unwrap().classification.is_some());
}

#[tokio::test]
async fn actions_stay_joined_to_their_source_message() {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let pipeline = build_pipeline(vec![message("m1")], work_replies(), store.clone());
    pipeline
        .fetch_and_process(&FetchOptions {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    store
        .insert_action(&NewAction {
            message_id: "m1".into(),
            description: "Review the document".into(),
            deadline: None,
            priority: ActionPriority::High,
            people: vec!["Alice".into()],
        })
        .await
        .unwrap();

    let pending = store.list_pending_actions().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message_id, "m1");
    assert_eq!(pending[0].subject, "Subject m1");
    assert_eq!(pending[0].sender, "alice@example.com");

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_messages, 1);
    assert_eq!(stats.pending_actions, 1);
    assert_eq!(stats.by_category, vec![("WORK".to_string(), 1)]);
}
