use super::{texts, WorkflowEngine};
use crate::models::conversation::ConversationState;
use crate::models::users::UserId;
use crate::services::ServiceError;
use crate::transport::{ChatId, PhotoRef, Sender};

impl WorkflowEngine {
    /// Whether an unexpected message from this chat goes to support at all.
    /// Admins and the service channels are answered with a hint instead.
    async fn should_forward(&self, from: &Sender, chat_id: ChatId) -> bool {
        if self.config.is_service_chat(chat_id) {
            return false;
        }
        if self.config.is_admin(from.id) {
            self.send(chat_id, texts::admin_hint(), None).await;
            return false;
        }
        true
    }

    pub(super) async fn forward_text(
        &self,
        from: &Sender,
        chat_id: ChatId,
        text: &str,
    ) -> Result<(), ServiceError> {
        if !self.should_forward(from, chat_id).await {
            return Ok(());
        }

        self.notifier
            .text(
                self.config.admin_channel,
                texts::forwarded_message(from, text),
                Some(texts::reply_button(from.id)),
            )
            .await?;
        self.send(chat_id, texts::message_forwarded(), None).await;

        Ok(())
    }

    pub(super) async fn forward_photo(
        &self,
        from: &Sender,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: Option<&str>,
    ) -> Result<(), ServiceError> {
        if !self.should_forward(from, chat_id).await {
            return Ok(());
        }

        self.notifier
            .photo(
                self.config.admin_channel,
                photo.clone(),
                texts::forwarded_message(from, caption.unwrap_or("")),
                Some(texts::reply_button(from.id)),
            )
            .await?;
        self.send(chat_id, texts::message_forwarded(), None).await;

        Ok(())
    }

    pub(super) async fn start_admin_message(
        &self,
        admin: &Sender,
        chat_id: ChatId,
        state: ConversationState,
    ) -> Result<(), ServiceError> {
        let target = match &state {
            ConversationState::AwaitingAdminReplyTarget { target_user_id }
            | ConversationState::AwaitingAdminFreeMessage { target_user_id } => *target_user_id,
            _ => return Ok(()),
        };

        self.conversations.set(admin.id, state).await?;
        self.send(chat_id, texts::admin_reply_prompt(target), None)
            .await;

        Ok(())
    }

    pub(super) async fn deliver_admin_message(
        &self,
        admin: &Sender,
        chat_id: ChatId,
        target: UserId,
        text: &str,
    ) -> Result<(), ServiceError> {
        let delivered = self
            .notifier
            .text(target, texts::admin_message(text), None)
            .await;
        self.conversations.clear(admin.id).await?;

        match delivered {
            Ok(_) => {
                log::info!("Admin {} messaged user {}", admin.id, target);
                self.send(chat_id, texts::admin_message_sent(target), None)
                    .await;
            }
            Err(e) => {
                log::warn!("Admin message to {} failed: {}", target, e);
                self.send(chat_id, texts::admin_message_failed(target), None)
                    .await;
            }
        }

        Ok(())
    }
}
