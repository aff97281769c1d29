//! Error types for inbox-agent.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail provider errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Credentials missing, expired, or rejected — fatal for the run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Mail provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Token cache error: {0}")]
    TokenCache(String),
}

/// Model provider errors.
///
/// Malformed model *output* is not an error here — the classifier recovers
/// from it locally with documented defaults. These variants cover the call
/// itself failing.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Authentication failed for model provider")]
    AuthFailed,

    #[error("Model provider rate limited")]
    RateLimited,

    #[error("Model provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response from model provider: {0}")]
    InvalidResponse(String),

    #[error("Model API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Malformed input caught before any external call is made.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Recipient address is empty")]
    EmptyRecipient,

    #[error("Invalid id: {0}")]
    InvalidId(String),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
