use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::models::{ChatId, MessageId};
use crate::models::users::UserId;

pub mod telegram;

pub use telegram::TelegramTransport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Opaque token handed back on press.
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl ToString) -> Self {
        Button {
            label: label.into(),
            action: action.to_string(),
        }
    }
}

/// Inline keyboard, one `Vec` per row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn button(self, label: impl Into<String>, action: impl ToString) -> Self {
        self.row(vec![Button::new(label, action)])
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|button| button.action.as_str())
    }
}

/// Transport-specific photo handle (a Telegram `file_id`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: UserId,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    Text {
        from: Sender,
        chat_id: ChatId,
        text: String,
    },
    Photo {
        from: Sender,
        chat_id: ChatId,
        photo: PhotoRef,
        caption: Option<String>,
    },
    Button {
        from: Sender,
        chat_id: ChatId,
        callback_id: String,
        message_id: Option<MessageId>,
        data: String,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &Sender {
        match self {
            InboundEvent::Text { from, .. }
            | InboundEvent::Photo { from, .. }
            | InboundEvent::Button { from, .. } => from,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            InboundEvent::Text { chat_id, .. }
            | InboundEvent::Photo { chat_id, .. }
            | InboundEvent::Button { chat_id, .. } => *chat_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Worth retrying: timeouts, rate limits, server errors.
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("transport rejected the request: {0}")]
    Permanent(String),
}

/// Outbound half of the messaging transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}
