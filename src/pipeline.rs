//! Fetch-and-process driver.
//!
//! Pulls recent messages from the mail source, classifies each one, and
//! stores the result. One message failing classification never aborts the
//! batch; the message is stored unclassified and counted as failed.
//! Authentication failures are fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::agents::Classifier;
use crate::error::{Error, LlmError};
use crate::llm::LlmProvider;
use crate::mail::MailSource;
use crate::model::EmailMessage;
use crate::store::Store;

/// Options for a single fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Maximum number of messages to pull.
    pub limit: usize,
    /// Provider-specific search query (e.g. "is:unread").
    pub query: Option<String>,
    /// Re-classify messages that are already stored.
    pub reprocess: bool,
}

/// Outcome of a fetch run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Messages returned by the mail source.
    pub fetched: usize,
    /// Messages classified and stored.
    pub processed: usize,
    /// Messages skipped because they were already stored.
    pub skipped: usize,
    /// Messages stored unclassified after a failed classification call.
    pub failed: usize,
    /// Ids of the messages processed this run.
    pub processed_ids: Vec<String>,
}

/// Drives fetch, classification, and storage.
pub struct Pipeline {
    mail: Arc<dyn MailSource>,
    classifier: Classifier,
    store: Arc<dyn Store>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        mail: Arc<dyn MailSource>,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn Store>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            mail,
            classifier: Classifier::new(llm),
            store,
            cancel,
        }
    }

    /// Fetch recent messages, classify, and store them.
    ///
    /// The cancel flag is checked between messages; already-stored results
    /// are kept when a run is cancelled partway.
    pub async fn fetch_and_process(&self, opts: &FetchOptions) -> Result<RunReport, Error> {
        self.mail.authenticate().await?;

        let messages = self
            .mail
            .fetch_recent(opts.limit, opts.query.as_deref())
            .await?;

        let mut report = RunReport {
            fetched: messages.len(),
            ..Default::default()
        };

        for msg in messages {
            if self.cancel.load(Ordering::Relaxed) {
                info!(
                    processed = report.processed,
                    remaining = report.fetched - report.processed - report.skipped - report.failed,
                    "Run cancelled"
                );
                break;
            }

            if !opts.reprocess && self.store.get_message(&msg.id).await?.is_some() {
                report.skipped += 1;
                continue;
            }

            let id = msg.id.clone();
            if self.process_one(msg).await? {
                report.processed += 1;
                report.processed_ids.push(id);
            } else {
                report.failed += 1;
            }
        }

        info!(
            fetched = report.fetched,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Fetch run complete"
        );
        Ok(report)
    }

    /// Classify and store one message. Returns whether classification
    /// succeeded; classification failures other than auth are absorbed and
    /// the message is stored without classification.
    async fn process_one(&self, msg: EmailMessage) -> Result<bool, Error> {
        match self.classifier.process(&msg).await {
            Ok(classification) => {
                let id = msg.id.clone();
                self.store
                    .upsert_message(&msg.with_classification(classification))
                    .await?;
                info!(id = %id, "Message classified and stored");
                Ok(true)
            }
            Err(e @ LlmError::AuthFailed) => Err(e.into()),
            Err(e) => {
                warn!(id = %msg.id, error = %e, "Classification failed, storing unclassified");
                self.store.upsert_message(&msg).await?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    use crate::error::MailError;
    use crate::llm::{Completion, CompletionRequest};
    use crate::store::LibSqlStore;

    struct StubMail {
        messages: Vec<EmailMessage>,
        auth_fails: bool,
    }

    #[async_trait]
    impl MailSource for StubMail {
        async fn authenticate(&self) -> Result<(), MailError> {
            if self.auth_fails {
                Err(MailError::Auth("token expired".into()))
            } else {
                Ok(())
            }
        }

        async fn fetch_recent(
            &self,
            max_results: usize,
            _query: Option<&str>,
        ) -> Result<Vec<EmailMessage>, MailError> {
            Ok(self.messages.iter().take(max_results).cloned().collect())
        }

        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<String, MailError> {
            Ok("sent-1".into())
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
            subject: "Status update".into(),
            sender: "alice@example.com".into(),
            recipient: "me@example.com".into(),
            body: "All on track.".into(),
            received_at: Utc.with_ymd_and_hms(2026, 2, 8, 9, 0, 0).unwrap(),
            classification: None,
            summary: None,
        }
    }

    fn work_replies() -> Vec<Result<String, LlmError>> {
        vec![
            Ok(r#"{"category": "WORK", "priority": 6, "reasoning": "status"}"#.into()),
            Ok(r#"{"sentiment": "neutral", "urgency": 4, "tone": "professional"}"#.into()),
        ]
    }

    fn pipeline(
        messages: Vec<EmailMessage>,
        replies: Vec<Result<String, LlmError>>,
        store: Arc<LibSqlStore>,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(StubMail {
                messages,
                auth_fails: false,
            }),
            Arc::new(StubLlm {
                replies: Mutex::new(replies),
            }),
            store,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn auth_failure_is_fatal() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let p = Pipeline::new(
            Arc::new(StubMail {
                messages: vec![message("m1")],
                auth_fails: true,
            }),
            Arc::new(StubLlm {
                replies: Mutex::new(vec![]),
            }),
            store,
            Arc::new(AtomicBool::new(false)),
        );

        let err = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mail(MailError::Auth(_))));
    }

    #[tokio::test]
    async fn processes_and_stores_classified_message() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let p = pipeline(vec![message("m1")], work_replies(), store.clone());

        let report = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 0);

        let stored = store.get_message("m1").await.unwrap().unwrap();
        let c = stored.classification.unwrap();
        assert_eq!(c.priority, 6);
        assert_eq!(c.urgency, 4);
    }

    #[tokio::test]
    async fn already_stored_messages_are_skipped() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store.upsert_message(&message("m1")).await.unwrap();

        let p = pipeline(vec![message("m1")], vec![], store.clone());
        let report = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn reprocess_flag_reclassifies() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        store.upsert_message(&message("m1")).await.unwrap();

        let p = pipeline(vec![message("m1")], work_replies(), store.clone());
        let report = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                reprocess: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 0);

        let stored = store.get_message("m1").await.unwrap().unwrap();
        assert!(stored.classification.is_some());
    }

    #[tokio::test]
    async fn failed_classification_stores_unclassified() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let mut replies = work_replies();
        replies.push(Err(LlmError::RateLimited));
        replies.push(Ok("unused".into()));

        let p = pipeline(vec![message("m1"), message("m2")], replies, store.clone());
        let report = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);

        let m2 = store.get_message("m2").await.unwrap().unwrap();
        assert!(m2.classification.is_none());
    }

    #[tokio::test]
    async fn llm_auth_failure_aborts_the_run() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let p = pipeline(
            vec![message("m1")],
            vec![Err(LlmError::AuthFailed), Ok("unused".into())],
            store.clone(),
        );

        let err = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(LlmError::AuthFailed)));
    }

    #[tokio::test]
    async fn cancel_flag_stops_between_messages() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let cancel = Arc::new(AtomicBool::new(true));
        let p = Pipeline::new(
            Arc::new(StubMail {
                messages: vec![message("m1"), message("m2")],
                auth_fails: false,
            }),
            Arc::new(StubLlm {
                replies: Mutex::new(vec![]),
            }),
            store.clone(),
            cancel,
        );

        let report = p
            .fetch_and_process(&FetchOptions {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.processed, 0);
        assert!(store.get_message("m1").await.unwrap().is_none());
    }
}
