//! Domain types — messages, classifications, action items, drafts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Fixed category label set the classifier is allowed to produce.
///
/// `Uncategorized` is the documented default when the model reply cannot
/// be parsed — it is never a valid model output on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Urgent,
    Work,
    Personal,
    Promotional,
    Social,
    Finance,
    Spam,
    Uncategorized,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Urgent => "URGENT",
            Category::Work => "WORK",
            Category::Personal => "PERSONAL",
            Category::Promotional => "PROMOTIONAL",
            Category::Social => "SOCIAL",
            Category::Finance => "FINANCE",
            Category::Spam => "SPAM",
            Category::Uncategorized => "UNCATEGORIZED",
        }
    }

    /// All labels a model reply may legitimately carry.
    pub fn all() -> &'static [Category] {
        &[
            Category::Urgent,
            Category::Work,
            Category::Personal,
            Category::Promotional,
            Category::Social,
            Category::Finance,
            Category::Spam,
        ]
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "URGENT" => Ok(Category::Urgent),
            "WORK" => Ok(Category::Work),
            "PERSONAL" => Ok(Category::Personal),
            "PROMOTIONAL" => Ok(Category::Promotional),
            "SOCIAL" => Ok(Category::Social),
            "FINANCE" => Ok(Category::Finance),
            "SPAM" => Ok(Category::Spam),
            "UNCATEGORIZED" => Ok(Category::Uncategorized),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall sentiment of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Lenient parse — anything unrecognized maps to `Neutral`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI-derived classification attached to a message.
///
/// Fields are all-present or the whole struct is absent — the two
/// classification calls are merged before anything is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// 1–10, 10 highest.
    pub priority: u8,
    pub sentiment: Sentiment,
    /// 1–10, 10 most urgent.
    pub urgency: u8,
    /// Emotional tone, free text (e.g. "professional").
    pub tone: String,
    /// Model's one-line explanation of the category choice.
    pub reasoning: String,
}

/// A fetched email, optionally enriched with classification and summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Provider message id — globally unique, natural key for upserts.
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    /// Plain text body (HTML stripped when no text part exists).
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub classification: Option<Classification>,
    pub summary: Option<String>,
}

impl EmailMessage {
    /// Attach a merged classification result.
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }
}

/// Priority label for an extracted action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl ActionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPriority::High => "high",
            ActionPriority::Medium => "medium",
            ActionPriority::Low => "low",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => ActionPriority::High,
            "low" => ActionPriority::Low,
            _ => ActionPriority::Medium,
        }
    }
}

/// An action item not yet persisted (no surrogate id).
#[derive(Debug, Clone)]
pub struct NewAction {
    pub message_id: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub priority: ActionPriority,
    pub people: Vec<String>,
}

/// A persisted action item, joined with its source message.
#[derive(Debug, Clone)]
pub struct ActionItem {
    pub id: i64,
    pub message_id: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub priority: ActionPriority,
    pub people: Vec<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Subject of the source message.
    pub subject: String,
    /// Sender of the source message.
    pub sender: String,
}

/// A drafted (possibly sent) reply to a message.
#[derive(Debug, Clone)]
pub struct Draft {
    pub id: i64,
    pub message_id: String,
    pub content: String,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts for the `stats` command.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_messages: i64,
    pub average_priority: f64,
    /// (category label, count), descending by count.
    pub by_category: Vec<(String, i64)>,
    pub pending_actions: i64,
}
