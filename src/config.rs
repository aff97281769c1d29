//! Configuration types.
//!
//! Built once from the environment in `main` and passed into each
//! component's constructor. There is no ambient global.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Application settings, sourced from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// OpenAI API key. Required — startup fails fast without it.
    pub openai_api_key: SecretString,
    /// The user's mailbox address (used in drafting context).
    pub email_address: Option<String>,
    /// Path to the local SQLite database file.
    pub db_path: PathBuf,
    /// Default number of messages per fetch.
    pub fetch_limit: usize,
    /// Model used for categorization and action extraction.
    pub categorization_model: String,
    /// Model used for summarization.
    pub summary_model: String,
    /// Model used for response drafting.
    pub response_model: String,
    /// Path to the OAuth token cache file.
    pub gmail_token_path: PathBuf,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// `OPENAI_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".into()))?;

        let fetch_limit = parse_var("INBOX_AGENT_FETCH_LIMIT", 50)?;
        let http_timeout_secs: u64 = parse_var("INBOX_AGENT_HTTP_TIMEOUT_SECS", 30)?;

        Ok(Self {
            openai_api_key: SecretString::from(openai_api_key),
            email_address: std::env::var("EMAIL_ADDRESS").ok(),
            db_path: std::env::var("INBOX_AGENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/emails.db")),
            fetch_limit,
            categorization_model: std::env::var("INBOX_AGENT_CATEGORIZATION_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            summary_model: std::env::var("INBOX_AGENT_SUMMARY_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            response_model: std::env::var("INBOX_AGENT_RESPONSE_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            gmail_token_path: std::env::var("GMAIL_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./token.json")),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
    }
}
