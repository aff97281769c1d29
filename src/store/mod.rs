//! Persistence layer — SQLite-backed storage for messages, actions, drafts.

pub mod libsql;
pub mod migrations;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    ActionItem, Category, Draft, EmailMessage, NewAction, StoreStats,
};

pub use libsql::LibSqlStore;

/// Backend-agnostic store covering messages, action items, and drafts.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace a message by its external id (idempotent).
    /// Classification columns are written together in one statement, so a
    /// message is either fully classified or not classified at all.
    async fn upsert_message(&self, msg: &EmailMessage) -> Result<(), StoreError>;

    /// Get a message by id.
    async fn get_message(&self, id: &str) -> Result<Option<EmailMessage>, StoreError>;

    /// Messages in a category, most recent first, up to `limit`.
    async fn list_by_category(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<Vec<EmailMessage>, StoreError>;

    /// Most recent messages, up to `limit`.
    async fn list_recent(&self, limit: usize) -> Result<Vec<EmailMessage>, StoreError>;

    /// All messages in a thread, oldest first.
    async fn list_thread(&self, thread_id: &str) -> Result<Vec<EmailMessage>, StoreError>;

    /// Attach a summary to a stored message.
    async fn set_summary(&self, id: &str, summary: &str) -> Result<(), StoreError>;

    /// Insert an action item. Fails with `NotFound` when the referenced
    /// message does not exist. Returns the surrogate id.
    async fn insert_action(&self, action: &NewAction) -> Result<i64, StoreError>;

    /// All incomplete action items, ordered by deadline.
    async fn list_pending_actions(&self) -> Result<Vec<ActionItem>, StoreError>;

    /// Mark an action completed. No-op when already completed; `NotFound`
    /// when the id never existed.
    async fn complete_action(&self, id: i64) -> Result<(), StoreError>;

    /// Save a draft reply. Fails with `NotFound` when the referenced
    /// message does not exist. Returns the surrogate id.
    async fn save_draft(&self, message_id: &str, content: &str) -> Result<i64, StoreError>;

    /// Drafts for a message, newest first.
    async fn list_drafts(&self, message_id: &str) -> Result<Vec<Draft>, StoreError>;

    /// Get a draft by id.
    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, StoreError>;

    /// Mark a draft as sent. `NotFound` when the id never existed.
    async fn mark_draft_sent(&self, id: i64) -> Result<(), StoreError>;

    /// Aggregate statistics for the `stats` command.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
