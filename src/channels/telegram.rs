//! Telegram channel — long-polls the Bot API for updates.
//!
//! Native Telegram Bot API implementation over `reqwest`: text messages and
//! inline-keyboard callback queries come in, messages with inline keyboards
//! go out. Menu navigation edits the message whose button was pressed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{Button, ButtonAction, Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: Arc<SecretString>,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token: Arc::new(bot_token),
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Send a message, splitting text above Telegram's limit. Buttons go on
    /// the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[Vec<Button>],
        markdown: bool,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last && !buttons.is_empty() {
                body["reply_markup"] = keyboard_markup(buttons);
            }
            self.post_with_markdown_fallback("sendMessage", body, markdown)
                .await?;
        }
        Ok(())
    }

    /// Replace the text and keyboard of an earlier bot message.
    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        buttons: &[Vec<Button>],
        markdown: bool,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if !buttons.is_empty() {
            body["reply_markup"] = keyboard_markup(buttons);
        }
        self.post_with_markdown_fallback("editMessageText", body, markdown)
            .await
    }

    /// POST `body` to `method`, trying Markdown first when requested and
    /// retrying as plain text if Telegram rejects the entities.
    async fn post_with_markdown_fallback(
        &self,
        method: &str,
        body: Value,
        markdown: bool,
    ) -> Result<(), ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            name: "telegram".into(),
            reason,
        };

        if markdown {
            let mut markdown_body = body.clone();
            markdown_body["parse_mode"] = json!("Markdown");

            let markdown_resp = self
                .client
                .post(self.api_url(method))
                .json(&markdown_body)
                .send()
                .await
                .map_err(|e| send_failed(e.to_string()))?;

            if markdown_resp.status().is_success() {
                return Ok(());
            }

            tracing::warn!(
                method,
                status = ?markdown_resp.status(),
                "Telegram {method} with Markdown failed; retrying without parse_mode"
            );
        }

        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("{method} failed ({status}): {err}")));
        }

        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = Arc::clone(&self.bot_token);
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if let Some(delay) = poll_backoff(&data) {
                    tracing::warn!(
                        error_code = ?data.get("error_code").and_then(serde_json::Value::as_i64),
                        description = data.get("description").and_then(serde_json::Value::as_str).unwrap_or("-"),
                        retry_in_secs = delay.as_secs(),
                        "Telegram getUpdates rejected"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    // Stop the button's loading spinner, whoever pressed it
                    if let Some(query_id) = update
                        .get("callback_query")
                        .and_then(|q| q.get("id"))
                        .and_then(Value::as_str)
                    {
                        let answered = client
                            .post(api_url(&bot_token, "answerCallbackQuery"))
                            .json(&json!({ "callback_query_id": query_id }))
                            .send()
                            .await
                            .and_then(reqwest::Response::error_for_status);
                        if let Err(e) = answered {
                            tracing::debug!(query_id, "answerCallbackQuery failed: {e}");
                        }
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    let username = incoming.metadata["username"].as_str().unwrap_or("unknown");
                    if !check_user_allowed(&allowed_users, [username, incoming.user_id.as_str()]) {
                        tracing::warn!(
                            "Telegram: ignoring update from unauthorized user: \
                             username={username}, user_id={}",
                            incoming.user_id
                        );
                        continue;
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        let message_id = msg.metadata.get("message_id").and_then(Value::as_i64);
        if let (true, Some(message_id)) = (response.replace_previous, message_id) {
            match self
                .edit_message(
                    chat_id,
                    message_id,
                    &response.content,
                    &response.buttons,
                    response.markdown,
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Telegram edit failed, sending a new message instead: {e}");
                }
            }
        }

        self.send_message(chat_id, &response.content, &response.buttons, response.markdown)
            .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self.client.get(self.api_url("getMe")).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            tracing::warn!(status = ?resp.status(), "Telegram getMe failed");
            Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "{TELEGRAM_API_BASE}/bot{}/{method}",
        bot_token.expose_secret()
    )
}

/// How long to wait before polling again, or `None` when `data` is a
/// successful getUpdates reply. Honours `parameters.retry_after` (sent with
/// 429s).
fn poll_backoff(data: &Value) -> Option<Duration> {
    let ok = data.get("ok").and_then(Value::as_bool) == Some(true);
    if ok && data.get("result").is_some_and(Value::is_array) {
        return None;
    }
    let retry_after = data
        .get("parameters")
        .and_then(|p| p.get("retry_after"))
        .and_then(Value::as_u64);
    Some(retry_after.map_or(POLL_RETRY_DELAY, Duration::from_secs))
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Turn one getUpdates entry into an inbound message.
///
/// Text messages and callback queries are kept; everything else (stickers,
/// edits, callbacks without data) yields `None`. Routing data lands in the
/// metadata: `chat_id`, `username`, and for callbacks `message_id` of the
/// message that carried the keyboard.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(query) = update.get("callback_query") {
        let data = query.get("data").and_then(Value::as_str)?;
        let from = query.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
        let message = query.get("message")?;
        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)?
            .to_string();
        let message_id = message.get("message_id").and_then(Value::as_i64);

        let mut incoming = IncomingMessage::callback("telegram", user_id, data).with_metadata(json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "username": from.get("username").and_then(Value::as_str),
        }));
        if let Some(name) = from.get("first_name").and_then(Value::as_str) {
            incoming = incoming.with_user_name(name);
        }
        return Some(incoming);
    }

    let message = update.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)?
        .to_string();

    let mut incoming = IncomingMessage::new("telegram", user_id, text).with_metadata(json!({
        "chat_id": chat_id,
        "username": from.get("username").and_then(Value::as_str),
    }));
    if let Some(name) = from.get("first_name").and_then(Value::as_str) {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// Build an `InlineKeyboardMarkup` from button rows.
fn keyboard_markup(rows: &[Vec<Button>]) -> Value {
    let keyboard: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.action {
                    ButtonAction::Callback(data) => {
                        json!({ "text": button.text, "callback_data": data })
                    }
                    ButtonAction::Url(url) => json!({ "text": button.text, "url": url }),
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": keyboard })
}

/// Largest char boundary in `text` at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}

/// Split a message into chunks that fit Telegram's limit (`max_len` bytes).
/// Tries to split on newlines, then spaces, then hard-cuts at a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = floor_char_boundary(remaining, max_len);
        if cut == 0 {
            // Limit smaller than the first char: emit it whole
            cut = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
