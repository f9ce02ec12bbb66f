use uuid::Uuid;

use super::{reports::start_of_today, texts, WorkflowEngine};
use crate::models::transactions::{ApprovalMessage, Outcome, Transaction, TransactionKind};
use crate::repositories::ledger::LedgerError;
use crate::services::ServiceError;
use crate::transport::{ChatId, MessageId, Sender};

const RECENT_USERS: i64 = 10;
const PENDING_LIMIT: i64 = 20;

pub(super) enum Decision {
    Applied(Transaction),
    AlreadyHandled(Transaction),
}

impl WorkflowEngine {
    /// Finalizes `id` if it is a pending transaction of `kind`. Losing a race
    /// with another admin comes back as `AlreadyHandled`.
    pub(super) async fn finalize(
        &self,
        id: Uuid,
        kind: TransactionKind,
        outcome: Outcome,
    ) -> Result<Decision, ServiceError> {
        match self.ledger.find_transaction(id).await? {
            Some(tx) if tx.kind == kind => {}
            _ => return Err(ServiceError::NotFound(format!("{} {}", kind, id))),
        }

        match self.ledger.finalize_transaction(id, outcome).await {
            Ok(tx) => Ok(Decision::Applied(tx)),
            Err(LedgerError::AlreadyFinalized(tx)) => Ok(Decision::AlreadyHandled(*tx)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remembers which admin card belongs to `tx` so a decision can close it.
    /// Runs after the transaction is committed; a failure only costs the card
    /// edit, since the request is still listed under /pending.
    pub(super) async fn record_approval(&self, tx: &Transaction, message_id: MessageId) {
        let approval = ApprovalMessage {
            transaction_id: tx.id,
            chat_id: self.config.admin_channel,
            message_id,
        };
        if let Err(e) = self.ledger.record_approval_message(&approval).await {
            log::error!("Could not record approval card for {}: {}", tx.id, e);
            self.send(
                self.config.admin_channel,
                texts::approval_not_recorded(tx, &e.to_string()),
                None,
            )
            .await;
        }
    }

    /// Closes the admin card, tells the user and archives the decision.
    pub(super) async fn publish_decision(
        &self,
        admin: &Sender,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        tx: &Transaction,
        outcome: Outcome,
        user_text: String,
    ) {
        let mut cards = Vec::with_capacity(2);
        match self.ledger.approval_message(tx.id).await {
            Ok(Some(approval)) => cards.push((approval.chat_id, approval.message_id)),
            Ok(None) => {}
            Err(e) => log::warn!("Approval card for {} unavailable: {}", tx.id, e),
        }
        if let Some(message_id) = message_id {
            if !cards.contains(&(chat_id, message_id)) {
                cards.push((chat_id, message_id));
            }
        }

        let card = texts::decided_card(tx, outcome, admin);
        for (card_chat, card_message) in cards {
            if let Err(e) = self
                .notifier
                .edit(card_chat, card_message, card.clone(), None)
                .await
            {
                log::warn!("Could not close approval card for {}: {}", tx.id, e);
            }
        }

        self.send(tx.user_id, user_text, None).await;
        self.send(
            self.config.archive_channel,
            texts::archive_entry(tx, admin),
            None,
        )
        .await;
    }

    pub(super) async fn show_stats(&self, chat_id: ChatId) -> Result<(), ServiceError> {
        let stats = self.ledger.stats(start_of_today()).await?;
        self.send(chat_id, texts::stats(&stats), Some(texts::admin_panel()))
            .await;
        Ok(())
    }

    pub(super) async fn show_wallets(&self, chat_id: ChatId) {
        let text = texts::payment_wallet(&self.config.payment_wallet, &self.config.payment_network);
        self.send(chat_id, text, Some(texts::admin_panel())).await;
    }

    pub(super) async fn show_recent_users(&self, chat_id: ChatId) -> Result<(), ServiceError> {
        let users = self.ledger.recent_users(RECENT_USERS).await?;
        self.send(chat_id, texts::recent_users(&users), None).await;
        Ok(())
    }

    pub(super) async fn show_pending(&self, chat_id: ChatId) -> Result<(), ServiceError> {
        let pending = self.ledger.pending_transactions(PENDING_LIMIT).await?;
        self.send(chat_id, texts::pending(&pending), None).await;

        for tx in &pending {
            if let Some(keyboard) = texts::pending_keyboard(tx) {
                self.send(
                    chat_id,
                    format!("{} {} from user {}", tx.kind, texts::usdt(tx.amount), tx.user_id),
                    Some(keyboard),
                )
                .await;
            }
        }
        Ok(())
    }

    pub(super) async fn set_user_active(
        &self,
        chat_id: ChatId,
        command: &str,
        argument: Option<&str>,
        active: bool,
    ) -> Result<(), ServiceError> {
        let user_id = argument
            .and_then(|argument| argument.parse().ok())
            .ok_or_else(|| ServiceError::Validation(texts::usage(command)))?;

        let user = self.ledger.set_active(user_id, active).await?;
        log::info!("User {} active = {}", user.id, user.is_active);

        self.send(chat_id, texts::account_status(&user), None).await;
        Ok(())
    }
}
