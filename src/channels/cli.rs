//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Buttons are printed as a numbered list; typing a number presses the
//! matching button, `:key` sends raw callback data, anything else is text.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Button, ButtonAction, Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    /// Buttons from the most recent response, in numbering order.
    last_buttons: Arc<Mutex<Vec<Button>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            last_buttons: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let last_buttons = Arc::clone(&self.last_buttons);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type /start to begin, /cancel to abort.");
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = {
                            let buttons = last_buttons.lock().unwrap_or_else(|p| p.into_inner());
                            parse_line(&line, &buttons)
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render_response(&response));
        *self.last_buttons.lock().unwrap_or_else(|p| p.into_inner()) =
            response.buttons.into_iter().flatten().collect();
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Map a typed line onto a text or button-press message.
fn parse_line(line: &str, buttons: &[Button]) -> IncomingMessage {
    if let Some(key) = line.strip_prefix(':').filter(|k| !k.is_empty()) {
        return IncomingMessage::callback("cli", CLI_USER, key);
    }

    let picked = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| buttons.get(i));
    if let Some(Button {
        action: ButtonAction::Callback(data),
        ..
    }) = picked
    {
        return IncomingMessage::callback("cli", CLI_USER, data.clone());
    }

    IncomingMessage::new("cli", CLI_USER, line)
}

/// Render text plus numbered buttons.
fn render_response(response: &OutgoingResponse) -> String {
    let mut out = response.content.clone();
    for (i, button) in response.buttons.iter().flatten().enumerate() {
        match &button.action {
            ButtonAction::Callback(_) => out.push_str(&format!("\n  [{}] {}", i + 1, button.text)),
            ButtonAction::Url(url) => out.push_str(&format!("\n  {} → {}", button.text, url)),
        }
    }
    out
}
