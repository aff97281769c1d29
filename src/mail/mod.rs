//! Mail source abstraction — fetch and send against a hosted mailbox API.

pub mod gmail;

use async_trait::async_trait;

use crate::error::MailError;
use crate::model::EmailMessage;

pub use gmail::{GmailSource, GoogleToken};

/// A hosted mailbox the pipeline can pull from and send through.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Establish a session from stored credentials, refreshing them if
    /// needed. Fails with `MailError::Auth` when credentials are missing
    /// or invalid — there is no interactive flow here.
    async fn authenticate(&self) -> Result<(), MailError>;

    /// Fetch up to `max_results` most-recent messages, optionally filtered
    /// by a provider-specific search query. Every returned message has all
    /// fields populated; bodies are decoded to plain text.
    async fn fetch_recent(
        &self,
        max_results: usize,
        query: Option<&str>,
    ) -> Result<Vec<EmailMessage>, MailError>;

    /// Compose and transmit a message. Returns the provider's delivery id.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError>;
}
