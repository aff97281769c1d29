//! CLI command handlers.
//!
//! Each handler wires up the components it needs from `Settings`, runs one
//! operation, and prints a plain-text result. All persistent state lives
//! in the store; handlers hold nothing between invocations.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::agents::{Extractor, Responder, Summarizer};
use crate::config::Settings;
use crate::error::{Error, StoreError, ValidationError};
use crate::llm::OpenAiProvider;
use crate::mail::{GmailSource, MailSource};
use crate::model::{Category, EmailMessage};
use crate::pipeline::{FetchOptions, Pipeline};
use crate::store::{LibSqlStore, Store};

async fn open_store(settings: &Settings) -> Result<Arc<LibSqlStore>, Error> {
    Ok(Arc::new(LibSqlStore::new_local(&settings.db_path).await?))
}

fn llm(settings: &Settings, model: &str) -> Arc<OpenAiProvider> {
    Arc::new(OpenAiProvider::new(
        settings.openai_api_key.clone(),
        model.to_string(),
        settings.http_timeout,
    ))
}

fn mail(settings: &Settings) -> Arc<GmailSource> {
    Arc::new(GmailSource::new(
        settings.gmail_token_path.clone(),
        settings.http_timeout,
    ))
}

fn print_message_line(msg: &EmailMessage) {
    let (category, priority) = match &msg.classification {
        Some(c) => (c.category.as_str(), c.priority.to_string()),
        None => ("-", "-".to_string()),
    };
    println!(
        "{:<18} {:<13} {:>3}  {:<28} {}",
        msg.id,
        category,
        priority,
        truncate_col(&msg.sender, 28),
        truncate_col(&msg.subject, 50),
    );
}

fn truncate_col(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Fetch recent mail, classify it, and store the results.
pub async fn fetch(
    settings: &Settings,
    limit: Option<usize>,
    query: Option<String>,
    reprocess: bool,
) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let llm = llm(settings, &settings.categorization_model);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping after the current message...");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let pipeline = Pipeline::new(mail(settings), llm, store, cancel);
    let report = pipeline
        .fetch_and_process(&FetchOptions {
            limit: limit.unwrap_or(settings.fetch_limit),
            query,
            reprocess,
        })
        .await?;

    println!(
        "Fetched {} message(s): {} processed, {} skipped, {} failed classification",
        report.fetched, report.processed, report.skipped, report.failed
    );
    Ok(())
}

/// List stored emails, optionally filtered by category.
pub async fn list_emails(
    settings: &Settings,
    category: Option<String>,
    limit: usize,
) -> Result<(), Error> {
    let store = open_store(settings).await?;

    let messages = match category {
        Some(raw) => {
            let category = Category::from_str(&raw).map_err(Error::from)?;
            store.list_by_category(category, limit).await?
        }
        None => store.list_recent(limit).await?,
    };

    if messages.is_empty() {
        println!("No stored emails match.");
        return Ok(());
    }

    println!(
        "{:<18} {:<13} {:>3}  {:<28} {}",
        "ID", "CATEGORY", "PRI", "FROM", "SUBJECT"
    );
    for msg in &messages {
        print_message_line(msg);
    }
    Ok(())
}

/// Show one stored email in full.
pub async fn show(settings: &Settings, id: &str) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let msg = store
        .get_message(id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "message".into(),
            id: id.to_string(),
        })?;

    println!("Id:       {}", msg.id);
    println!("Thread:   {}", msg.thread_id);
    println!("From:     {}", msg.sender);
    println!("To:       {}", msg.recipient);
    println!("Date:     {}", msg.received_at.to_rfc3339());
    println!("Subject:  {}", msg.subject);
    match &msg.classification {
        Some(c) => {
            println!(
                "Category: {} (priority {}, urgency {}, {} / {})",
                c.category, c.priority, c.urgency, c.sentiment, c.tone
            );
            if !c.reasoning.is_empty() {
                println!("Reason:   {}", c.reasoning);
            }
        }
        None => println!("Category: (unclassified)"),
    }
    if let Some(summary) = &msg.summary {
        println!("\nSummary:\n{summary}");
    }
    println!("\n{}", msg.body);

    let drafts = store.list_drafts(id).await?;
    if !drafts.is_empty() {
        println!("\nDrafts:");
        for d in &drafts {
            let status = if d.sent { "sent" } else { "unsent" };
            println!("  #{} [{}] {}", d.id, status, truncate_col(&d.content, 60));
        }
    }
    Ok(())
}

/// Summarize one email, or its whole thread.
pub async fn summarize(settings: &Settings, id: &str, thread: bool) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let summarizer = Summarizer::new(llm(settings, &settings.summary_model), store.clone());

    let summary = if thread {
        let msg = store
            .get_message(id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "message".into(),
                id: id.to_string(),
            })?;
        summarizer.summarize_thread(&msg.thread_id).await?
    } else {
        summarizer.summarize(id).await?
    };

    println!("{summary}");
    Ok(())
}

/// Draft a reply and save it. Nothing is sent.
pub async fn draft(settings: &Settings, id: &str, tone: Option<String>) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let responder = Responder::new(
        llm(settings, &settings.response_model),
        store,
        settings.email_address.clone(),
    );

    let (draft_id, content) = responder.draft(id, tone.as_deref()).await?;
    println!("Saved draft #{draft_id}:\n\n{content}");
    println!("\nSend with: send-draft {draft_id}");
    Ok(())
}

/// Send a saved draft, by default back to the original sender.
pub async fn send_draft(
    settings: &Settings,
    draft_id: i64,
    to: Option<String>,
) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let draft = store
        .get_draft(draft_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "draft".into(),
            id: draft_id.to_string(),
        })?;

    if draft.sent {
        println!("Draft #{draft_id} was already sent.");
        return Ok(());
    }

    let msg = store
        .get_message(&draft.message_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "message".into(),
            id: draft.message_id.clone(),
        })?;

    let recipient = to.unwrap_or_else(|| msg.sender.clone());
    if recipient.trim().is_empty() {
        return Err(ValidationError::EmptyRecipient.into());
    }

    let subject = if msg.subject.to_ascii_lowercase().starts_with("re:") {
        msg.subject.clone()
    } else {
        format!("Re: {}", msg.subject)
    };

    let mail = mail(settings);
    mail.authenticate().await?;
    let sent_id = mail.send(&recipient, &subject, &draft.content).await?;
    store.mark_draft_sent(draft_id).await?;

    println!("Sent draft #{draft_id} to {recipient} (message {sent_id})");
    Ok(())
}

/// Extract action items from a stored email.
pub async fn extract_actions(settings: &Settings, id: &str) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let extractor = Extractor::new(llm(settings, &settings.categorization_model), store);

    let inserted = extractor.extract(id).await?;
    if inserted.is_empty() {
        println!("No action items found.");
        return Ok(());
    }

    println!("Recorded {} action item(s):", inserted.len());
    for (action_id, action) in &inserted {
        let deadline = action
            .deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<4} [{:<6}] due {:<10} {}",
            action_id,
            action.priority.as_str(),
            deadline,
            action.description
        );
    }
    Ok(())
}

/// List all pending action items.
pub async fn actions(settings: &Settings) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let pending = store.list_pending_actions().await?;

    if pending.is_empty() {
        println!("No pending actions.");
        return Ok(());
    }

    println!("{:<5} {:<6} {:<11} {:<28} DESCRIPTION", "ID", "PRI", "DUE", "FROM");
    for a in &pending {
        let deadline = a
            .deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<5} {:<6} {:<11} {:<28} {}",
            a.id,
            a.priority.as_str(),
            deadline,
            truncate_col(&a.sender, 28),
            a.description
        );
        if !a.people.is_empty() {
            println!("      people: {}", a.people.join(", "));
        }
    }
    Ok(())
}

/// Mark an action item completed.
pub async fn complete_action(settings: &Settings, id: i64) -> Result<(), Error> {
    let store = open_store(settings).await?;
    store.complete_action(id).await?;
    println!("Action #{id} completed.");
    Ok(())
}

/// Print aggregate statistics about the stored mailbox.
pub async fn stats(settings: &Settings) -> Result<(), Error> {
    let store = open_store(settings).await?;
    let stats = store.stats().await?;

    println!("Messages:         {}", stats.total_messages);
    println!("Average priority: {:.1}", stats.average_priority);
    println!("Pending actions:  {}", stats.pending_actions);
    if stats.by_category.is_empty() {
        if stats.total_messages > 0 {
            warn!("No classified messages yet");
        }
        return Ok(());
    }
    println!("By category:");
    for (label, count) in &stats.by_category {
        println!("  {:<13} {}", label, count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_col_keeps_short_strings() {
        assert_eq!(truncate_col("short", 10), "short");
    }

    #[test]
    fn truncate_col_shortens_long_strings() {
        let out = truncate_col("a very long subject line indeed", 10);
        assert!(out.chars().count() <= 10);
        assert!(out.ends_with('…'));
    }
}
