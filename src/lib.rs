//! inbox-agent — fetch email, classify it with an LLM, and keep a local
//! queryable archive of messages, summaries, drafts, and action items.

pub mod agents;
pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod model;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
