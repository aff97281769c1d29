//! Gmail REST v1 adapter — OAuth2 token cache with refresh, message fetch
//! with MIME body decoding, and raw RFC 822 send.
//!
//! Authentication only consumes a pre-provisioned token cache (the JSON
//! format written by Google's client libraries). The interactive consent
//! flow is a separate provisioning concern and does not live here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::MailError;
use crate::mail::MailSource;
use crate::model::EmailMessage;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// ── Token cache ─────────────────────────────────────────────────────

/// OAuth2 token payload, compatible with the token.json written by
/// Google's client libraries (`token` and `access_token` both accepted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Token expiry time (ISO 8601).
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Whether the access token is expired (or within 60 s of expiring).
pub fn is_token_expired(token: &GoogleToken) -> bool {
    match &token.expiry {
        None => true,
        Some(raw) => match DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
        {
            Ok(expiry) => expiry <= Utc::now() + chrono::Duration::seconds(60),
            Err(_) => true,
        },
    }
}

// ── API payload types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Gmail-backed `MailSource`.
pub struct GmailSource {
    client: reqwest::Client,
    token_path: PathBuf,
    token: RwLock<Option<GoogleToken>>,
}

impl GmailSource {
    /// Create an adapter reading its token cache from `token_path`.
    pub fn new(token_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            token_path: token_path.into(),
            token: RwLock::new(None),
        }
    }

    /// Return a valid access token, refreshing and persisting if expired.
    async fn access_token(&self) -> Result<String, MailError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref()
                && !is_token_expired(token)
            {
                return Ok(token.token.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Re-check under the write lock: another task may have refreshed.
        if let Some(token) = guard.as_ref()
            && !is_token_expired(token)
        {
            return Ok(token.token.clone());
        }

        let mut token = match guard.take() {
            Some(t) => t,
            None => load_token(&self.token_path)?,
        };

        if is_token_expired(&token) {
            token = self.refresh(token).await?;
            save_token(&self.token_path, &token)?;
            info!("Refreshed Gmail access token");
        }

        let access = token.token.clone();
        *guard = Some(token);
        Ok(access)
    }

    /// Refresh an expired access token via the OAuth2 token endpoint.
    async fn refresh(&self, token: GoogleToken) -> Result<GoogleToken, MailError> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| MailError::Auth("token cache has no refresh token".into()))?;

        let mut form = vec![
            ("client_id", token.client_id.clone()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token".to_string()),
        ];
        if let Some(secret) = token.client_secret.clone() {
            form.push(("client_secret", secret));
        }

        let resp = self.client.post(&token.token_uri).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let lowered = body.to_lowercase();
            if lowered.contains("invalid_grant") || lowered.contains("expired") {
                return Err(MailError::Auth("refresh token expired or revoked".into()));
            }
            return Err(MailError::Auth(format!(
                "token refresh failed: HTTP {status}: {body}"
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| MailError::Auth(format!("malformed token response: {e}")))?;
        let access_token = parsed["access_token"]
            .as_str()
            .ok_or_else(|| MailError::Auth("no access_token in refresh response".into()))?;
        let expires_in = parsed["expires_in"].as_u64().unwrap_or(3600);
        let expiry = Utc::now() + chrono::Duration::seconds(expires_in as i64);

        let mut refreshed = token;
        refreshed.token = access_token.to_string();
        refreshed.expiry = Some(expiry.to_rfc3339());
        Ok(refreshed)
    }

    /// Fetch one message in full and map it to the domain type.
    async fn fetch_detail(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> Result<EmailMessage, MailError> {
        let url = format!("{GMAIL_BASE}/messages/{message_id}");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailError::Auth("access token rejected".into()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let detail: MessageDetail = resp.json().await.map_err(MailError::Transport)?;
        Ok(message_from_detail(detail))
    }
}

#[async_trait]
impl MailSource for GmailSource {
    async fn authenticate(&self) -> Result<(), MailError> {
        self.access_token().await.map(|_| ())
    }

    async fn fetch_recent(
        &self,
        max_results: usize,
        query: Option<&str>,
    ) -> Result<Vec<EmailMessage>, MailError> {
        let access_token = self.access_token().await?;

        let mut params = vec![("maxResults", max_results.to_string())];
        if let Some(q) = query
            && !q.is_empty()
        {
            params.push(("q", q.to_string()));
        }

        let resp = self
            .client
            .get(format!("{GMAIL_BASE}/messages"))
            .bearer_auth(&access_token)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailError::Auth("access token rejected".into()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: MessageListResponse = resp.json().await.map_err(MailError::Transport)?;
        debug!(count = list.messages.len(), "Listed messages");

        let mut emails = Vec::with_capacity(list.messages.len());
        for stub in &list.messages {
            match self.fetch_detail(&access_token, &stub.id).await {
                Ok(email) => emails.push(email),
                // Auth failures abort — anything else skips just this message.
                Err(e @ MailError::Auth(_)) => return Err(e),
                Err(e) => warn!(id = %stub.id, error = %e, "Skipping message"),
            }
        }

        Ok(emails)
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError> {
        if to.is_empty() {
            return Err(MailError::Send("recipient address is empty".into()));
        }
        let access_token = self.access_token().await?;

        let raw = build_rfc822(to, subject, body);
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw);

        let resp = self
            .client
            .post(format!("{GMAIL_BASE}/messages/send"))
            .bearer_auth(&access_token)
            .json(&serde_json::json!({ "raw": encoded }))
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MailError::Auth("access token rejected".into()));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(MailError::Send(format!("HTTP {status}: {message}")));
        }

        let sent: SendResponse = resp.json().await.map_err(MailError::Transport)?;
        info!(to = %to, id = %sent.id, "Email sent");
        Ok(sent.id)
    }
}

// ── Token file I/O ──────────────────────────────────────────────────

fn load_token(path: &Path) -> Result<GoogleToken, MailError> {
    if !path.exists() {
        return Err(MailError::Auth(format!(
            "token cache not found at {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| MailError::TokenCache(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| MailError::TokenCache(format!("{}: {e}", path.display())))
}

fn save_token(path: &Path, token: &GoogleToken) -> Result<(), MailError> {
    let content = serde_json::to_string_pretty(token)
        .map_err(|e| MailError::TokenCache(e.to_string()))?;
    std::fs::write(path, content)
        .map_err(|e| MailError::TokenCache(format!("{}: {e}", path.display())))
}

// ── Payload mapping ─────────────────────────────────────────────────

/// Map a full Gmail message payload to the domain type.
fn message_from_detail(detail: MessageDetail) -> EmailMessage {
    let empty: [Header; 0] = [];
    let headers: &[Header] = detail
        .payload
        .as_ref()
        .map(|p| &p.headers[..])
        .unwrap_or(&empty);

    let get_header = |name: &str| -> String {
        headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    };

    let received_at = parse_rfc2822_date(&get_header("Date"));
    let subject = get_header("Subject");
    let sender = get_header("From");
    let recipient = get_header("To");

    let body = detail
        .payload
        .as_ref()
        .map(extract_body)
        .unwrap_or_default();

    EmailMessage {
        id: detail.id,
        thread_id: detail.thread_id,
        subject,
        sender,
        recipient,
        body,
        received_at,
        classification: None,
        summary: None,
    }
}

/// Extract a plain-text body: prefer `text/plain`, fall back to
/// tag-stripped `text/html`.
fn extract_body(payload: &MessagePart) -> String {
    if let Some(text) = find_part_text(payload, "text/plain") {
        return text;
    }
    if let Some(html) = find_part_text(payload, "text/html") {
        return strip_html(&html);
    }
    String::new()
}

/// Recursively walk MIME parts for decoded body data of the target type.
fn find_part_text(part: &MessagePart, target_mime: &str) -> Option<String> {
    if part.mime_type == target_mime
        && let Some(body) = &part.body
        && let Some(data) = &body.data
        && let Some(text) = decode_url_safe_base64(data)
    {
        return Some(text);
    }
    for child in &part.parts {
        if let Some(text) = find_part_text(child, target_mime) {
            return Some(text);
        }
    }
    None
}

/// Decode URL-safe base64 (no padding) as used by the Gmail API.
fn decode_url_safe_base64(data: &str) -> Option<String> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Strip HTML tags from content (basic) and normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an RFC 2822 `Date:` header; falls back to now.
fn parse_rfc2822_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Build a minimal RFC 822 text message for the raw send endpoint.
fn build_rfc822(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn token_accepts_access_token_alias() {
        let json = r#"{
            "access_token": "ya29.alias",
            "refresh_token": "1//refresh",
            "client_id": "client"
        }"#;
        let token: GoogleToken = serde_json::from_str(json).unwrap();
        assert_eq!(token.token, "ya29.alias");
        assert_eq!(token.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn token_without_expiry_is_expired() {
        let token = GoogleToken {
            token: "t".into(),
            refresh_token: None,
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            expiry: None,
        };
        assert!(is_token_expired(&token));
    }

    #[test]
    fn token_with_future_expiry_is_valid() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let token = GoogleToken {
            token: "t".into(),
            refresh_token: None,
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            expiry: Some(future.to_rfc3339()),
        };
        assert!(!is_token_expired(&token));
    }

    #[test]
    fn token_near_expiry_counts_as_expired() {
        let soon = Utc::now() + chrono::Duration::seconds(30);
        let token = GoogleToken {
            token: "t".into(),
            refresh_token: None,
            token_uri: default_token_uri(),
            client_id: "c".into(),
            client_secret: None,
            expiry: Some(soon.to_rfc3339()),
        };
        assert!(is_token_expired(&token));
    }

    #[test]
    fn body_prefers_plain_text_part() {
        let json = serde_json::json!({
            "mimeType": "multipart/alternative",
            "parts": [
                {
                    "mimeType": "text/html",
                    "body": { "data": encode("<p>Hello <b>HTML</b></p>") }
                },
                {
                    "mimeType": "text/plain",
                    "body": { "data": encode("Hello plain") }
                }
            ]
        });
        let part: MessagePart = serde_json::from_value(json).unwrap();
        assert_eq!(extract_body(&part), "Hello plain");
    }

    #[test]
    fn body_falls_back_to_stripped_html() {
        let json = serde_json::json!({
            "mimeType": "text/html",
            "body": { "data": encode("<div><b>Bold</b> and plain</div>") }
        });
        let part: MessagePart = serde_json::from_value(json).unwrap();
        assert_eq!(extract_body(&part), "Bold and plain");
    }

    #[test]
    fn body_walks_nested_parts() {
        let json = serde_json::json!({
            "mimeType": "multipart/mixed",
            "parts": [
                {
                    "mimeType": "multipart/alternative",
                    "parts": [
                        {
                            "mimeType": "text/plain",
                            "body": { "data": encode("nested body") }
                        }
                    ]
                }
            ]
        });
        let part: MessagePart = serde_json::from_value(json).unwrap();
        assert_eq!(extract_body(&part), "nested body");
    }

    #[test]
    fn detail_maps_headers_to_fields() {
        let json = serde_json::json!({
            "id": "m123",
            "threadId": "t456",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    { "name": "From", "value": "Jane <jane@example.com>" },
                    { "name": "To", "value": "me@example.com" },
                    { "name": "Subject", "value": "Project update" },
                    { "name": "Date", "value": "Sun, 8 Feb 2026 09:30:00 -0500" }
                ],
                "body": { "data": encode("Hi there") }
            }
        });
        let detail: MessageDetail = serde_json::from_value(json).unwrap();
        let msg = message_from_detail(detail);
        assert_eq!(msg.id, "m123");
        assert_eq!(msg.thread_id, "t456");
        assert_eq!(msg.sender, "Jane <jane@example.com>");
        assert_eq!(msg.recipient, "me@example.com");
        assert_eq!(msg.subject, "Project update");
        assert_eq!(msg.body, "Hi there");
        assert_eq!(msg.received_at.to_rfc3339(), "2026-02-08T14:30:00+00:00");
        assert!(msg.classification.is_none());
    }

    #[test]
    fn strip_html_removes_tags_and_normalizes() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
        assert_eq!(strip_html("  no  html   here "), "no html here");
    }

    #[test]
    fn unparseable_date_falls_back_to_now() {
        let parsed = parse_rfc2822_date("not a date");
        assert!((Utc::now() - parsed).num_seconds().abs() < 5);
    }

    #[test]
    fn rfc822_message_has_headers_and_body() {
        let raw = build_rfc822("bob@example.com", "Hi", "Body text");
        assert!(raw.starts_with("To: bob@example.com\r\n"));
        assert!(raw.contains("Subject: Hi\r\n"));
        assert!(raw.ends_with("\r\n\r\nBody text"));
    }

    #[test]
    fn message_list_tolerates_empty_response() {
        let json = r#"{"resultSizeEstimate": 0}"#;
        let list: MessageListResponse = serde_json::from_str(json).unwrap();
        assert!(list.messages.is_empty());
    }
}
