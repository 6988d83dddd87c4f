//! Messaging Platform Abstraction
//!
//! Inbound event shapes consumed by the engine and the outbound interface the
//! engine drives. The Telegram adapter lives in `telegram.rs`; tests use
//! in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::keyboards::Keyboard;

/// Error types for platform operations
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Chat class as far as anti-spam and triggering care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatKind {
    /// 1:1 conversation with the bot
    Private,
    /// Group, supergroup or channel
    Group,
}

/// Message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// Photo, sticker, voice, document, ...
    Unsupported,
}

/// Inbound message event
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: i32,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender_id: i64,
    pub sender_first_name: String,
    pub content: MessageContent,
    /// Sender of the message this one replies to, if any
    pub replied_to_sender: Option<i64>,
}

impl InboundMessage {
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t.as_str()),
            MessageContent::Unsupported => None,
        }
    }

    pub fn sender_key(&self) -> String {
        self.sender_id.to_string()
    }
}

/// Inline-button press
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub query_id: String,
    pub user_id: i64,
    pub user_first_name: String,
    /// Chat and message carrying the pressed keyboard (absent if inaccessible)
    pub message: Option<(i64, i32)>,
    pub data: String,
}

/// Outbound message
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub html: bool,
    pub reply_to: Option<i32>,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            html: false,
            reply_to: None,
            keyboard: None,
        }
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }

    pub fn reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Channel membership status as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// Counts as having joined the channel
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }
}

/// Messaging platform operations used by the engine
#[async_trait]
pub trait Platform: Send + Sync {
    /// Send a message
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), PlatformError>;

    /// Replace the text (and keyboard) of an existing message
    ///
    /// Failures are swallowed and reported as `false`.
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> bool;

    /// Acknowledge a button press, optionally with a toast
    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), PlatformError>;

    /// Membership status of `user_id` in `channel` (username without `@`)
    async fn chat_member_status(&self, channel: &str, user_id: i64) -> Result<MemberStatus, PlatformError>;

    /// Show the "typing..." indicator
    async fn send_typing(&self, chat_id: i64) -> Result<(), PlatformError>;
}
