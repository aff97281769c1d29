//! libSQL backend — async `Store` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{
    ActionItem, ActionPriority, Category, Classification, Draft, EmailMessage, NewAction,
    Sentiment, StoreStats,
};
use crate::store::{Store, migrations};

/// libSQL store backend.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn message_exists(&self, id: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM emails WHERE id = ?1", params![id])
            .await
            .map_err(|e| StoreError::Query(format!("message_exists: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count > 0)
            }
            _ => Ok(false),
        }
    }

    async fn query_messages(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> Result<Vec<EmailMessage>, StoreError> {
        let mut rows = self
            .conn()
            .query(sql, args)
            .await
            .map_err(|e| StoreError::Query(format!("query_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => tracing::warn!("Skipping message row: {e}"),
            }
        }
        Ok(messages)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_int(n: Option<i64>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

const MESSAGE_COLUMNS: &str = "id, thread_id, subject, sender, recipient, body, received_at, \
                               category, priority, sentiment, urgency, tone, reasoning, summary";

/// Map a libsql row (MESSAGE_COLUMNS order) to an EmailMessage.
///
/// Classification columns are written together, so `category` being
/// present means the rest of the classification columns are too.
fn row_to_message(row: &libsql::Row) -> Result<EmailMessage, libsql::Error> {
    let received_str: String = row.get(6)?;
    let category_str: Option<String> = row.get(7).ok();

    let classification = match category_str {
        Some(cat) => {
            let sentiment_str: String = row.get::<String>(9).unwrap_or_default();
            Some(Classification {
                category: cat.parse::<Category>().unwrap_or(Category::Uncategorized),
                priority: row.get::<i64>(8).unwrap_or(5).clamp(1, 10) as u8,
                sentiment: Sentiment::parse_lenient(&sentiment_str),
                urgency: row.get::<i64>(10).unwrap_or(5).clamp(1, 10) as u8,
                tone: row.get::<String>(11).unwrap_or_default(),
                reasoning: row.get::<String>(12).unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(EmailMessage {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        subject: row.get(2)?,
        sender: row.get(3)?,
        recipient: row.get(4)?,
        body: row.get(5)?,
        received_at: parse_datetime(&received_str),
        classification,
        summary: row.get(13).ok(),
    })
}

const ACTION_COLUMNS: &str = "a.id, a.message_id, a.description, a.deadline, a.priority, \
                              a.people, a.completed, a.created_at, e.subject, e.sender";

/// Map a libsql row (ACTION_COLUMNS order) to an ActionItem.
fn row_to_action(row: &libsql::Row) -> Result<ActionItem, libsql::Error> {
    let deadline_str: Option<String> = row.get(3).ok();
    let priority_str: String = row.get(4)?;
    let people_str: String = row.get(5)?;
    let created_str: String = row.get(7)?;

    Ok(ActionItem {
        id: row.get(0)?,
        message_id: row.get(1)?,
        description: row.get(2)?,
        deadline: deadline_str
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        priority: ActionPriority::parse_lenient(&priority_str),
        people: serde_json::from_str(&people_str).unwrap_or_default(),
        completed: row.get::<i64>(6)? != 0,
        created_at: parse_datetime(&created_str),
        subject: row.get(8)?,
        sender: row.get(9)?,
    })
}

/// Map a libsql row (id, message_id, content, sent, created_at) to a Draft.
fn row_to_draft(row: &libsql::Row) -> Result<Draft, libsql::Error> {
    let created_str: String = row.get(4)?;
    Ok(Draft {
        id: row.get(0)?,
        message_id: row.get(1)?,
        content: row.get(2)?,
        sent: row.get::<i64>(3)? != 0,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn upsert_message(&self, msg: &EmailMessage) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let (category, priority, sentiment, urgency, tone, reasoning) =
            match &msg.classification {
                Some(c) => (
                    opt_text(Some(c.category.as_str())),
                    opt_int(Some(c.priority as i64)),
                    opt_text(Some(c.sentiment.as_str())),
                    opt_int(Some(c.urgency as i64)),
                    opt_text(Some(&c.tone)),
                    opt_text(Some(&c.reasoning)),
                ),
                None => (
                    opt_text(None),
                    opt_int(None),
                    opt_text(None),
                    opt_int(None),
                    opt_text(None),
                    opt_text(None),
                ),
            };

        self.conn()
            .execute(
                "INSERT OR REPLACE INTO emails (id, thread_id, subject, sender, recipient, body, \
                    received_at, category, priority, sentiment, urgency, tone, reasoning, summary, \
                    created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                    COALESCE((SELECT created_at FROM emails WHERE id = ?1), ?15), ?15)",
                params![
                    msg.id.as_str(),
                    msg.thread_id.as_str(),
                    msg.subject.as_str(),
                    msg.sender.as_str(),
                    msg.recipient.as_str(),
                    msg.body.as_str(),
                    msg.received_at.to_rfc3339(),
                    category,
                    priority,
                    sentiment,
                    urgency,
                    tone,
                    reasoning,
                    opt_text(msg.summary.as_deref()),
                    now,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert_message: {e}")))?;

        debug!(id = %msg.id, classified = msg.classification.is_some(), "Message upserted");
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<EmailMessage>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let msg = row_to_message(&row)
                    .map_err(|e| StoreError::Query(format!("get_message row parse: {e}")))?;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_message: {e}"))),
        }
    }

    async fn list_by_category(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<Vec<EmailMessage>, StoreError> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM emails WHERE category = ?1 \
                 ORDER BY received_at DESC LIMIT ?2"
            ),
            params![category.as_str(), limit as i64],
        )
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<EmailMessage>, StoreError> {
        self.query_messages(
            &format!("SELECT {MESSAGE_COLUMNS} FROM emails ORDER BY received_at DESC LIMIT ?1"),
            params![limit as i64],
        )
        .await
    }

    async fn list_thread(&self, thread_id: &str) -> Result<Vec<EmailMessage>, StoreError> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM emails WHERE thread_id = ?1 \
                 ORDER BY received_at ASC"
            ),
            params![thread_id],
        )
        .await
    }

    async fn set_summary(&self, id: &str, summary: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE emails SET summary = ?1, updated_at = ?2 WHERE id = ?3",
                params![summary, now, id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_summary: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_action(&self, action: &NewAction) -> Result<i64, StoreError> {
        if !self.message_exists(&action.message_id).await? {
            return Err(StoreError::NotFound {
                entity: "message".into(),
                id: action.message_id.clone(),
            });
        }

        let people = serde_json::to_string(&action.people)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let deadline = opt_text(
            action
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .as_deref(),
        );

        self.conn()
            .execute(
                "INSERT INTO actions (message_id, description, deadline, priority, people) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    action.message_id.as_str(),
                    action.description.as_str(),
                    deadline,
                    action.priority.as_str(),
                    people,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_action: {e}")))?;

        Ok(self.conn().last_insert_rowid())
    }

    async fn list_pending_actions(&self) -> Result<Vec<ActionItem>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACTION_COLUMNS} FROM actions a \
                     JOIN emails e ON e.id = a.message_id \
                     WHERE a.completed = 0 \
                     ORDER BY a.deadline IS NULL, a.deadline ASC, a.id ASC"
                ),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_pending_actions: {e}")))?;

        let mut actions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_action(&row) {
                Ok(a) => actions.push(a),
                Err(e) => tracing::warn!("Skipping action row: {e}"),
            }
        }
        Ok(actions)
    }

    async fn complete_action(&self, id: i64) -> Result<(), StoreError> {
        let count = self
            .conn()
            .execute(
                "UPDATE actions SET completed = 1 WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("complete_action: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound {
                entity: "action".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn save_draft(&self, message_id: &str, content: &str) -> Result<i64, StoreError> {
        if !self.message_exists(message_id).await? {
            return Err(StoreError::NotFound {
                entity: "message".into(),
                id: message_id.to_string(),
            });
        }

        self.conn()
            .execute(
                "INSERT INTO drafts (message_id, content) VALUES (?1, ?2)",
                params![message_id, content],
            )
            .await
            .map_err(|e| StoreError::Query(format!("save_draft: {e}")))?;

        Ok(self.conn().last_insert_rowid())
    }

    async fn list_drafts(&self, message_id: &str) -> Result<Vec<Draft>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, message_id, content, sent, created_at FROM drafts \
                 WHERE message_id = ?1 ORDER BY id DESC",
                params![message_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_drafts: {e}")))?;

        let mut drafts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_draft(&row) {
                Ok(d) => drafts.push(d),
                Err(e) => tracing::warn!("Skipping draft row: {e}"),
            }
        }
        Ok(drafts)
    }

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, message_id, content, sent, created_at FROM drafts WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let draft = row_to_draft(&row)
                    .map_err(|e| StoreError::Query(format!("get_draft row parse: {e}")))?;
                Ok(Some(draft))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_draft: {e}"))),
        }
    }

    async fn mark_draft_sent(&self, id: i64) -> Result<(), StoreError> {
        let count = self
            .conn()
            .execute("UPDATE drafts SET sent = 1 WHERE id = ?1", params![id])
            .await
            .map_err(|e| StoreError::Query(format!("mark_draft_sent: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound {
                entity: "draft".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn();

        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(AVG(priority), 0.0) FROM emails",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("stats totals: {e}")))?;

        let mut stats = StoreStats::default();
        if let Ok(Some(row)) = rows.next().await {
            stats.total_messages = row.get(0).unwrap_or(0);
            stats.average_priority = row.get(1).unwrap_or(0.0);
        }

        let mut rows = conn
            .query(
                "SELECT category, COUNT(*) FROM emails WHERE category IS NOT NULL \
                 GROUP BY category ORDER BY COUNT(*) DESC, category ASC",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("stats categories: {e}")))?;

        while let Ok(Some(row)) = rows.next().await {
            let label: String = row.get(0).unwrap_or_default();
            let count: i64 = row.get(1).unwrap_or(0);
            stats.by_category.push((label, count));
        }

        let mut rows = conn
            .query("SELECT COUNT(*) FROM actions WHERE completed = 0", ())
            .await
            .map_err(|e| StoreError::Query(format!("stats actions: {e}")))?;

        if let Ok(Some(row)) = rows.next().await {
            stats.pending_actions = row.get(0).unwrap_or(0);
        }

        Ok(stats)
    }
}
