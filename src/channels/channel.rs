//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Unique message ID.
    pub id: Uuid,
    /// Channel the message arrived on.
    pub channel: String,
    /// Stable user identifier within the channel.
    pub user_id: String,
    /// Display name, if the transport provides one.
    pub user_name: Option<String>,
    /// Typed text. Empty for button presses.
    pub content: String,
    /// Button callback data, when the message is a button press.
    pub callback_data: Option<String>,
    /// Transport-specific routing data (chat id, message id, ...).
    pub metadata: serde_json::Value,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Create a text message.
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            user_id: user_id.into(),
            user_name: None,
            content: content.into(),
            callback_data: None,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    /// Create a button-press message.
    pub fn callback(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            callback_data: Some(data.into()),
            ..Self::new(channel, user_id, "")
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn is_callback(&self) -> bool {
        self.callback_data.is_some()
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Send the key back to the bot as callback data.
    Callback(String),
    /// Open a URL.
    Url(String),
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// A message to send back to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingResponse {
    /// Message text.
    pub content: String,
    /// Button rows.
    pub buttons: Vec<Vec<Button>>,
    /// Whether `content` uses Markdown.
    pub markdown: bool,
    /// Replace the message whose button triggered this response, if the
    /// transport supports it.
    pub replace_previous: bool,
}

impl OutgoingResponse {
    /// Plain text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn markdown(mut self) -> Self {
        self.markdown = true;
        self
    }

    pub fn replacing_previous(mut self) -> Self {
        self.replace_previous = true;
        self
    }
}

/// A message transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used to route responses.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response to the user who sent `msg`.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Verify the channel can reach its backend.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Stop the channel.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}
