//! Inbound frames and the messages handed to the bot pipeline.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Subtype Slack puts on messages posted by bots (including our own replies).
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// One parsed RTM frame. The shape depends on `type`; only a few fields matter.
#[derive(Debug, Clone)]
pub struct RawEvent(Value);

impl RawEvent {
    /// Parse a text frame. Anything that is not JSON is a malformed frame.
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map(Self).map_err(Error::MalformedFrame)
    }

    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn user(&self) -> Option<&str> {
        self.str_field("user")
    }

    pub fn subtype(&self) -> Option<&str> {
        self.str_field("subtype")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// A human-sent chat message, or `None` for everything the pipeline drops:
    /// other event kinds, bot posts, and messages without a sender or channel.
    pub fn into_chat(self) -> Option<ChatEvent> {
        if self.kind() != Some("message") || self.subtype() == Some(BOT_MESSAGE_SUBTYPE) {
            return None;
        }
        let user = self.user()?.to_string();
        let channel = self.str_field("channel")?.to_string();
        let text = self.str_field("text").unwrap_or_default().to_string();
        Some(ChatEvent { user, text, channel })
    }
}

/// An eligible message before user references are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub user: String,
    pub text: String,
    pub channel: String,
}

/// A platform-agnostic inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedMessage {
    /// Text with every resolvable `<@ID>` replaced by a display name.
    pub text: String,
    /// Sender display name.
    pub user: String,
    /// Sender id as Slack knows it.
    pub user_id: String,
    pub room: String,
    /// Name of the connector that produced this message.
    pub connector: String,
}

impl NormalizedMessage {
    /// A reply to the room this message came from.
    pub fn reply(&self, text: impl Into<String>) -> Reply {
        Reply::new(&self.room, text)
    }
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub room: String,
    pub text: String,
    /// Passed through to `chat.postMessage` untouched.
    pub attachments: Option<Value>,
}

impl Reply {
    pub fn new(room: &str, text: impl Into<String>) -> Self {
        Self {
            room: room.to_string(),
            text: text.into(),
            attachments: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Value) -> Self {
        self.attachments = Some(attachments);
        self
    }
}
