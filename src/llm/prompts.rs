//! Prompt construction for the agents.
//!
//! Every builder truncates the body to a bounded character budget so a
//! single oversized email cannot blow up cost or latency.

use crate::model::EmailMessage;

/// Body budget for classification and sentiment calls.
pub const CLASSIFY_BODY_BUDGET: usize = 1000;
/// Body budget for summarization and action extraction.
pub const SUMMARY_BODY_BUDGET: usize = 2000;
/// Body budget for response drafting.
pub const DRAFT_BODY_BUDGET: usize = 1500;

/// Truncate to at most `budget` characters (not bytes).
pub fn truncate(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}

/// System prompt for the categorization call.
pub fn categorization_system_prompt() -> String {
    "You are an email categorization expert. Categorize the email into ONE of:\n\
     - URGENT: Requires immediate attention or response\n\
     - WORK: Work-related, professional communication\n\
     - PERSONAL: Personal communication from friends/family\n\
     - PROMOTIONAL: Marketing, newsletters, promotions\n\
     - SOCIAL: Social media notifications, updates\n\
     - FINANCE: Banking, bills, financial statements\n\
     - SPAM: Unwanted or suspicious emails\n\n\
     Also rate the priority 1-10 (10 highest).\n\n\
     Respond with ONLY a JSON object:\n\
     {\"category\": \"CATEGORY_NAME\", \"priority\": 7, \"reasoning\": \"one sentence\"}"
        .to_string()
}

/// User prompt for the categorization call.
pub fn categorization_user_prompt(msg: &EmailMessage) -> String {
    format!(
        "Email Subject: {}\nEmail From: {}\nEmail Body: {}",
        msg.subject,
        msg.sender,
        truncate(&msg.body, CLASSIFY_BODY_BUDGET),
    )
}

/// System prompt for the sentiment call.
pub fn sentiment_system_prompt() -> String {
    "Analyze the sentiment and urgency of the email.\n\n\
     Determine:\n\
     1. Overall sentiment (positive/neutral/negative)\n\
     2. Urgency level (1-10, where 10 is most urgent)\n\
     3. Emotional tone (professional/casual/frustrated/excited/etc.)\n\n\
     Respond with ONLY a JSON object:\n\
     {\"sentiment\": \"neutral\", \"urgency\": 7, \"tone\": \"professional\", \"reasoning\": \"one sentence\"}"
        .to_string()
}

/// User prompt for the sentiment call.
pub fn sentiment_user_prompt(msg: &EmailMessage) -> String {
    format!(
        "Subject: {}\nBody: {}",
        msg.subject,
        truncate(&msg.body, CLASSIFY_BODY_BUDGET),
    )
}

/// System prompt for summarization (single email or thread).
pub fn summarization_system_prompt() -> String {
    "You are an expert at summarizing email conversations.\n\n\
     Provide a concise summary that includes:\n\
     1. Main topic/purpose of the email\n\
     2. Key points or requests\n\
     3. Any action items or deadlines\n\
     4. Important people mentioned\n\n\
     Keep the summary under 150 words and focus on actionable information."
        .to_string()
}

/// User prompt for summarizing a single email.
pub fn summarization_user_prompt(msg: &EmailMessage) -> String {
    format!(
        "Subject: {}\nFrom: {}\nDate: {}\n\n{}",
        msg.subject,
        msg.sender,
        msg.received_at.to_rfc3339(),
        truncate(&msg.body, SUMMARY_BODY_BUDGET),
    )
}

/// User prompt for summarizing a whole thread, oldest first.
pub fn thread_summary_user_prompt(messages: &[EmailMessage]) -> String {
    let mut prompt = String::with_capacity(1024);
    for (i, msg) in messages.iter().enumerate() {
        prompt.push_str(&format!(
            "--- Email {} ---\nSubject: {}\nFrom: {}\nDate: {}\n\n{}\n\n",
            i + 1,
            msg.subject,
            msg.sender,
            msg.received_at.to_rfc3339(),
            truncate(&msg.body, CLASSIFY_BODY_BUDGET),
        ));
    }
    prompt
}

/// System prompt for response drafting.
pub fn response_system_prompt() -> String {
    "You are a professional email assistant. Draft a response to the email.\n\n\
     Draft a concise response that:\n\
     1. Acknowledges the main points\n\
     2. Addresses any questions or requests\n\
     3. Matches the requested tone\n\
     4. Is clear and actionable\n\n\
     Respond with the draft text only — no preamble."
        .to_string()
}

/// User prompt for response drafting.
pub fn response_user_prompt(msg: &EmailMessage, context: &str) -> String {
    format!(
        "Original Email:\nSubject: {}\nFrom: {}\nBody: {}\n\n\
         Context about the recipient:\n{}",
        msg.subject,
        msg.sender,
        truncate(&msg.body, DRAFT_BODY_BUDGET),
        context,
    )
}

/// System prompt for action extraction.
pub fn action_extraction_system_prompt() -> String {
    "You are an expert at extracting actionable items from emails.\n\n\
     Extract all actionable items: tasks, meetings, deadlines, questions\n\
     needing answers, and decisions to be made.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"actions\": [{\"description\": \"...\", \"deadline\": \"YYYY-MM-DD or null\", \
     \"priority\": \"high/medium/low\", \"people\": [\"person1\"]}]}"
        .to_string()
}

/// User prompt for action extraction.
pub fn action_extraction_user_prompt(msg: &EmailMessage) -> String {
    format!(
        "Subject: {}\nBody: {}",
        msg.subject,
        truncate(&msg.body, SUMMARY_BODY_BUDGET),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_message(body: &str) -> EmailMessage {
        EmailMessage {
            id: "m1".into(),
            thread_id: "t1".into(),
            subject: "Quarterly review".into(),
            sender: "alice@example.com".into(),
            recipient: "me@example.com".into(),
            body: body.into(),
            received_at: Utc::now(),
            classification: None,
            summary: None,
        }
    }

    #[test]
    fn categorization_prompt_includes_fields() {
        let msg = sample_message("Please review the attached numbers.");
        let prompt = categorization_user_prompt(&msg);
        assert!(prompt.contains("Quarterly review"));
        assert!(prompt.contains("alice@example.com"));
        assert!(prompt.contains("attached numbers"));
    }

    #[test]
    fn categorization_system_prompt_lists_all_labels() {
        let prompt = categorization_system_prompt();
        for label in ["URGENT", "WORK", "PERSONAL", "PROMOTIONAL", "SOCIAL", "FINANCE", "SPAM"] {
            assert!(prompt.contains(label), "missing {label}");
        }
    }

    #[test]
    fn body_is_truncated_to_budget() {
        let long_body = "x".repeat(5000);
        let msg = sample_message(&long_body);
        let prompt = categorization_user_prompt(&msg);
        assert!(prompt.len() < CLASSIFY_BODY_BUDGET + 200);
    }

    #[test]
    fn truncate_is_char_safe() {
        // Multibyte characters must not be split.
        let s = "é".repeat(20);
        assert_eq!(truncate(&s, 5).chars().count(), 5);
    }

    #[test]
    fn thread_prompt_numbers_messages() {
        let msgs = vec![sample_message("first"), sample_message("second")];
        let prompt = thread_summary_user_prompt(&msgs);
        assert!(prompt.contains("--- Email 1 ---"));
        assert!(prompt.contains("--- Email 2 ---"));
        assert!(prompt.contains("first"));
        assert!(prompt.contains("second"));
    }
}
