use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{RequestHandler, Service, ServiceError};
use crate::transport::{ChatId, Keyboard, MessageId, PhotoRef, Transport, TransportError};

#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Text {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat_id: ChatId,
        photo: PhotoRef,
        caption: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

impl Outbound {
    fn target(&self) -> Option<ChatId> {
        match self {
            Outbound::Text { chat_id, .. }
            | Outbound::Photo { chat_id, .. }
            | Outbound::Edit { chat_id, .. } => Some(*chat_id),
            Outbound::Answer { .. } => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Outbound::Text { chat_id, .. } => format!("text to {}", chat_id),
            Outbound::Photo { chat_id, .. } => format!("photo to {}", chat_id),
            Outbound::Edit {
                chat_id,
                message_id,
                ..
            } => format!("edit of {}/{}", chat_id, message_id),
            Outbound::Answer { callback_id, .. } => format!("answer to {}", callback_id),
        }
    }
}

pub enum NotificationRequest {
    Deliver {
        message: Outbound,
        response: oneshot::Sender<Result<Option<MessageId>, ServiceError>>,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay before retrying after the given (1-based) failed attempt.
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(500))
    }
}

#[derive(Clone)]
pub struct NotificationRequestHandler {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    admin_channel: ChatId,
}

impl NotificationRequestHandler {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, admin_channel: ChatId) -> Self {
        NotificationRequestHandler {
            transport,
            policy,
            admin_channel,
        }
    }

    async fn attempt(&self, message: &Outbound) -> Result<Option<MessageId>, TransportError> {
        match message {
            Outbound::Text {
                chat_id,
                text,
                keyboard,
            } => self
                .transport
                .send_text(*chat_id, text, keyboard.as_ref())
                .await
                .map(Some),
            Outbound::Photo {
                chat_id,
                photo,
                caption,
                keyboard,
            } => self
                .transport
                .send_photo(*chat_id, photo, caption, keyboard.as_ref())
                .await
                .map(Some),
            Outbound::Edit {
                chat_id,
                message_id,
                text,
                keyboard,
            } => self
                .transport
                .edit_message(*chat_id, *message_id, text, keyboard.as_ref())
                .await
                .map(|_| None),
            Outbound::Answer { callback_id, text } => self
                .transport
                .answer_button(callback_id, text.as_deref())
                .await
                .map(|_| None),
        }
    }

    async fn deliver(&self, message: Outbound) -> Result<Option<MessageId>, ServiceError> {
        let mut attempt = 1;

        loop {
            match self.attempt(&message).await {
                Ok(id) => return Ok(id),
                Err(TransportError::Transient(reason)) if attempt < self.policy.max_attempts => {
                    log::warn!(
                        "Delivery of {} failed (attempt {}/{}): {}",
                        message.describe(),
                        attempt,
                        self.policy.max_attempts,
                        reason
                    );
                    tokio::time::sleep(self.policy.delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Giving up on {}: {}", message.describe(), e);
                    self.escalate(&message, &e).await;

                    return Err(ServiceError::Delivery(message.describe(), e.to_string()));
                }
            }
        }
    }

    async fn escalate(&self, message: &Outbound, error: &TransportError) {
        // Button answers have no chat, and a dead admin channel has nowhere to go.
        match message.target() {
            Some(chat_id) if chat_id != self.admin_channel => {}
            _ => return,
        }

        let text = format!("⚠️ Delivery failed: {}\n\n{}", message.describe(), error);
        if let Err(e) = self
            .transport
            .send_text(self.admin_channel, &text, None)
            .await
        {
            log::error!("Could not escalate delivery failure: {}", e);
        }
    }
}

#[async_trait]
impl RequestHandler<NotificationRequest> for NotificationRequestHandler {
    async fn handle_request(&self, request: NotificationRequest) {
        match request {
            NotificationRequest::Deliver { message, response } => {
                let result = self.deliver(message).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        NotificationService {}
    }
}

#[async_trait]
impl Service<NotificationRequest, NotificationRequestHandler> for NotificationService {}

/// Cloneable front for the notification service channel.
#[derive(Clone)]
pub struct Notifier {
    channel: mpsc::Sender<NotificationRequest>,
}

impl Notifier {
    pub fn new(channel: mpsc::Sender<NotificationRequest>) -> Self {
        Notifier { channel }
    }

    pub async fn deliver(&self, message: Outbound) -> Result<Option<MessageId>, ServiceError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.channel
            .send(NotificationRequest::Deliver {
                message,
                response: response_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("notifications".into(), e.to_string()))?;

        response_rx
            .await
            .map_err(|e| ServiceError::Communication("notifications".into(), e.to_string()))?
    }

    pub async fn text(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<Option<MessageId>, ServiceError> {
        self.deliver(Outbound::Text {
            chat_id,
            text: text.into(),
            keyboard,
        })
        .await
    }

    pub async fn photo(
        &self,
        chat_id: ChatId,
        photo: PhotoRef,
        caption: impl Into<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<Option<MessageId>, ServiceError> {
        self.deliver(Outbound::Photo {
            chat_id,
            photo,
            caption: caption.into(),
            keyboard,
        })
        .await
    }

    pub async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: impl Into<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<(), ServiceError> {
        self.deliver(Outbound::Edit {
            chat_id,
            message_id,
            text: text.into(),
            keyboard,
        })
        .await
        .map(|_| ())
    }

    pub async fn answer(&self, callback_id: &str, text: Option<String>) -> Result<(), ServiceError> {
        self.deliver(Outbound::Answer {
            callback_id: callback_id.to_string(),
            text,
        })
        .await
        .map(|_| ())
    }
}
