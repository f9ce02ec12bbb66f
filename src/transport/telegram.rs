use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{ChatId, InboundEvent, Keyboard, MessageId, PhotoRef, Sender, Transport, TransportError};

const API_URL: &str = "https://api.telegram.org";

pub struct TelegramTransport {
    url: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Result<Self, reqwest::Error> {
        Self::with_base_url(API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{}", self.url, method))
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::Transient(format!("{}: {}", method, e.without_url())))?;

        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            classify(status, format!("{}: undecodable response: {}", method, e.without_url()))
        })?;

        match body.result {
            Some(result) if body.ok => Ok(result),
            _ => Err(classify(
                status,
                format!(
                    "{}: {}",
                    method,
                    body.description.unwrap_or_else(|| status.to_string())
                ),
            )),
        }
    }
}

fn classify(status: StatusCode, reason: String) -> TransportError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        TransportError::Transient(reason)
    } else {
        TransportError::Permanent(reason)
    }
}

fn reply_markup(keyboard: Option<&Keyboard>) -> Value {
    match keyboard {
        Some(keyboard) => json!({
            "inline_keyboard": keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| json!({"text": button.label, "callback_data": button.action}))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        }),
        None => json!({"inline_keyboard": []}),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let mut payload = json!({"chat_id": chat_id, "text": text});
        if keyboard.is_some() {
            payload["reply_markup"] = reply_markup(keyboard);
        }

        let message: Message = self.call("sendMessage", payload).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "reply_markup": reply_markup(keyboard),
        });

        match self.call::<Value>("editMessageText", payload).await {
            Ok(_) => Ok(()),
            // Approval cards for payment proofs are photos and only carry a caption.
            Err(TransportError::Permanent(reason)) if reason.contains("no text in the message") => {
                let payload = json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "caption": text,
                    "reply_markup": reply_markup(keyboard),
                });
                self.call::<Value>("editMessageCaption", payload).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let mut payload = json!({"chat_id": chat_id, "photo": photo.0, "caption": caption});
        if keyboard.is_some() {
            payload["reply_markup"] = reply_markup(keyboard);
        }

        let message: Message = self.call("sendPhoto", payload).await?;
        Ok(message.message_id)
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({"callback_query_id": callback_id});
        if let Some(text) = text {
            payload["text"] = json!(text);
        }

        self.call::<bool>("answerCallbackQuery", payload).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub from: Option<TelegramUser>,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl From<TelegramUser> for Sender {
    fn from(user: TelegramUser) -> Self {
        Sender {
            id: user.id,
            first_name: user.first_name,
            username: user.username,
        }
    }
}

/// Maps a webhook update onto an engine event. Updates the engine has no use
/// for (channel posts, stickers, edits) yield `None`.
pub fn parse_update(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let chat_id = query
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(query.from.id);

        return Some(InboundEvent::Button {
            chat_id,
            callback_id: query.id,
            message_id: query.message.map(|message| message.message_id),
            data: query.data.unwrap_or_default(),
            from: query.from.into(),
        });
    }

    let message = update.message?;
    let from: Sender = message.from?.into();

    if let Some(photos) = message.photo {
        let largest = photos
            .into_iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))?;

        return Some(InboundEvent::Photo {
            from,
            chat_id: message.chat.id,
            photo: PhotoRef(largest.file_id),
            caption: message.caption,
        });
    }

    message.text.map(|text| InboundEvent::Text {
        from,
        chat_id: message.chat.id,
        text,
    })
}
