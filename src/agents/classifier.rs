//! Email classification — category/priority plus sentiment/urgency.
//!
//! The two model calls are independent and run concurrently. Model output
//! is parsed strictly against a fixed schema; anything malformed degrades
//! to documented defaults instead of failing, so `process()` only errors
//! when a call itself fails (transport, auth, rate limit).

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object, prompts};
use crate::model::{Category, Classification, EmailMessage, Sentiment};

/// Temperature for classification calls (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.3;
/// Max tokens for classification replies (small JSON objects).
const CLASSIFY_MAX_TOKENS: u32 = 256;

/// Documented defaults used when a model reply cannot be parsed.
pub const DEFAULT_PRIORITY: u8 = 5;
pub const DEFAULT_URGENCY: u8 = 5;
pub const DEFAULT_TONE: &str = "professional";

/// Result of a strict parse-with-fallback step.
///
/// `Defaulted` means the model reply was malformed and the documented
/// defaults were substituted — the caller still gets usable fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Defaulted(T),
}

impl<T> ParseOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            ParseOutcome::Parsed(v) | ParseOutcome::Defaulted(v) => v,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, ParseOutcome::Defaulted(_))
    }
}

/// Category half of a classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub category: Category,
    pub priority: u8,
    pub reasoning: String,
}

impl Default for CategoryResult {
    fn default() -> Self {
        Self {
            category: Category::Uncategorized,
            priority: DEFAULT_PRIORITY,
            reasoning: String::new(),
        }
    }
}

/// Sentiment half of a classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub urgency: u8,
    pub tone: String,
}

impl Default for SentimentResult {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            urgency: DEFAULT_URGENCY,
            tone: DEFAULT_TONE.to_string(),
        }
    }
}

/// LLM-backed email classifier.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Categorize an email and rate its priority.
    ///
    /// Never fails on malformed model output — only on the call itself.
    pub async fn classify(
        &self,
        msg: &EmailMessage,
    ) -> Result<ParseOutcome<CategoryResult>, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::categorization_system_prompt()),
            ChatMessage::user(prompts::categorization_user_prompt(msg)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let outcome = parse_category_reply(&response.content);
        if outcome.is_defaulted() {
            warn!(
                id = %msg.id,
                raw = %response.content.chars().take(200).collect::<String>(),
                "Unparseable categorization reply, using defaults"
            );
        }
        Ok(outcome)
    }

    /// Analyze sentiment, urgency, and tone.
    pub async fn analyze_sentiment(
        &self,
        msg: &EmailMessage,
    ) -> Result<ParseOutcome<SentimentResult>, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::sentiment_system_prompt()),
            ChatMessage::user(prompts::sentiment_user_prompt(msg)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        let outcome = parse_sentiment_reply(&response.content);
        if outcome.is_defaulted() {
            warn!(
                id = %msg.id,
                raw = %response.content.chars().take(200).collect::<String>(),
                "Unparseable sentiment reply, using defaults"
            );
        }
        Ok(outcome)
    }

    /// Run both classification calls concurrently and merge the results.
    ///
    /// The merge happens before anything is written anywhere, so the
    /// classification fields land all-or-none.
    pub async fn process(&self, msg: &EmailMessage) -> Result<Classification, LlmError> {
        let (category, sentiment) =
            tokio::join!(self.classify(msg), self.analyze_sentiment(msg));
        let category = category?.into_inner();
        let sentiment = sentiment?.into_inner();

        Ok(Classification {
            category: category.category,
            priority: category.priority,
            sentiment: sentiment.sentiment,
            urgency: sentiment.urgency,
            tone: sentiment.tone,
            reasoning: category.reasoning,
        })
    }
}

// ── Reply parsing ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct CategoryReply {
    category: String,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Deserialize)]
struct SentimentReply {
    sentiment: String,
    #[serde(default)]
    urgency: Option<i64>,
    #[serde(default)]
    tone: String,
}

/// Clamp a model-supplied rating into 1–10, defaulting when absent.
fn clamp_rating(raw: Option<i64>, default: u8) -> u8 {
    match raw {
        None => default,
        Some(v) => v.clamp(1, 10) as u8,
    }
}

/// Parse the categorization reply; malformed input yields defaults.
pub fn parse_category_reply(raw: &str) -> ParseOutcome<CategoryResult> {
    let json = extract_json_object(raw);
    let reply: CategoryReply = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(_) => return ParseOutcome::Defaulted(CategoryResult::default()),
    };
    let Ok(category) = reply.category.parse::<Category>() else {
        return ParseOutcome::Defaulted(CategoryResult::default());
    };
    ParseOutcome::Parsed(CategoryResult {
        category,
        priority: clamp_rating(reply.priority, DEFAULT_PRIORITY),
        reasoning: reply.reasoning,
    })
}

/// Parse the sentiment reply; malformed input yields defaults.
pub fn parse_sentiment_reply(raw: &str) -> ParseOutcome<SentimentResult> {
    let json = extract_json_object(raw);
    let reply: SentimentReply = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(_) => return ParseOutcome::Defaulted(SentimentResult::default()),
    };
    ParseOutcome::Parsed(SentimentResult {
        sentiment: Sentiment::parse_lenient(&reply.sentiment),
        urgency: clamp_rating(reply.urgency, DEFAULT_URGENCY),
        tone: if reply.tone.is_empty() {
            DEFAULT_TONE.to_string()
        } else {
            reply.tone
        },
    })
}
