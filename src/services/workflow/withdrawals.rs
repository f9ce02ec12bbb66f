use rust_decimal::Decimal;
use uuid::Uuid;

use super::admin::Decision;
use super::{texts, WorkflowEngine};
use crate::models::conversation::{ConversationState, WithdrawKind};
use crate::models::transactions::{NewTransaction, Outcome, TransactionKind};
use crate::services::ServiceError;
use crate::transport::{ChatId, MessageId, Sender};

impl WorkflowEngine {
    pub(super) async fn show_withdraw_menu(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        if let Some(user) = self.registered_user(from, chat_id).await? {
            let (text, keyboard) = texts::withdraw_menu(&user);
            self.send(chat_id, text, Some(keyboard)).await;
        }
        Ok(())
    }

    pub(super) async fn show_amount_picker(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        if self.registered_user(from, chat_id).await?.is_some() {
            let (text, keyboard) = texts::amount_picker(
                &self.config.amount_options,
                self.config.withdrawal_minimum,
            );
            self.send(chat_id, text, Some(keyboard)).await;
        }
        Ok(())
    }

    /// Fixed-amount withdrawal. Checked against the minimum and the current
    /// balance before anything is recorded.
    pub(super) async fn request_withdrawal(
        &self,
        from: &Sender,
        chat_id: ChatId,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };

        if amount < self.config.withdrawal_minimum {
            self.send(chat_id, texts::below_minimum(self.config.withdrawal_minimum), None)
                .await;
            return Ok(());
        }
        if amount > user.balance {
            self.send(chat_id, texts::insufficient_balance(user.balance), None)
                .await;
            return Ok(());
        }

        self.conversations
            .set(
                from.id,
                ConversationState::AwaitingWalletAddress {
                    kind: WithdrawKind::Profits,
                    amount: Some(amount),
                },
            )
            .await?;
        self.send(chat_id, texts::wallet_prompt(Some(amount)), None)
            .await;

        Ok(())
    }

    pub(super) async fn request_bonus_withdrawal(
        &self,
        from: &Sender,
        chat_id: ChatId,
    ) -> Result<(), ServiceError> {
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };

        if user.balance <= Decimal::ZERO {
            self.send(chat_id, texts::insufficient_balance(user.balance), None)
                .await;
            return Ok(());
        }

        self.conversations
            .set(
                from.id,
                ConversationState::AwaitingWalletAddress {
                    kind: WithdrawKind::Bonus,
                    amount: None,
                },
            )
            .await?;
        self.send(chat_id, texts::wallet_prompt(None), None).await;

        Ok(())
    }

    pub(super) async fn submit_wallet(
        &self,
        from: &Sender,
        chat_id: ChatId,
        address: &str,
        kind: WithdrawKind,
        amount: Option<Decimal>,
    ) -> Result<(), ServiceError> {
        if !self.config.is_valid_wallet(address) {
            self.send(
                chat_id,
                texts::invalid_wallet(&self.config.wallet_prefixes),
                None,
            )
            .await;
            return Ok(());
        }

        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };

        // The balance may have moved since the amount was picked.
        let amount = match (kind, amount) {
            (WithdrawKind::Profits, Some(amount)) => amount,
            _ => user.balance,
        };
        if amount <= Decimal::ZERO || amount > user.balance {
            self.conversations.clear(from.id).await?;
            self.send(chat_id, texts::insufficient_balance(user.balance), None)
                .await;
            return Ok(());
        }

        let tx = self
            .ledger
            .raise_transaction(NewTransaction::withdrawal(user.id, amount, address))
            .await?;
        self.conversations.clear(from.id).await?;
        log::info!(
            "Raised withdrawal {} of {} for user {} to {}",
            tx.id,
            tx.amount,
            user.id,
            address
        );

        let (text, keyboard) = texts::withdrawal_card(&user, &tx);
        match self
            .notifier
            .text(self.config.admin_channel, text, Some(keyboard))
            .await
        {
            Ok(Some(message_id)) => self.record_approval(&tx, message_id).await,
            // Still listed under /pending.
            result => log::warn!("Withdrawal card for {} not delivered: {:?}", tx.id, result.err()),
        }

        self.send(
            chat_id,
            texts::withdrawal_submitted(&tx),
            Some(texts::main_menu()),
        )
        .await;
        Ok(())
    }

    pub(super) async fn decide_withdrawal(
        &self,
        admin: &Sender,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        id: Uuid,
        approve: bool,
    ) -> Result<String, ServiceError> {
        let outcome = if approve {
            Outcome::Completed
        } else {
            Outcome::Rejected
        };

        if approve {
            if let Some(tx) = self.ledger.find_transaction(id).await? {
                let balance = self
                    .ledger
                    .find_user(tx.user_id)
                    .await?
                    .map(|user| user.balance)
                    .unwrap_or_default();
                if tx.is_pending() && balance < tx.amount {
                    return Ok(format!(
                        "⚠️ Balance is only {}. Reject this request instead.",
                        texts::usdt(balance)
                    ));
                }
            }
        }

        let tx = match self
            .finalize(id, TransactionKind::Withdrawal, outcome)
            .await?
        {
            Decision::Applied(tx) => tx,
            Decision::AlreadyHandled(tx) => return Ok(texts::already_handled(&tx)),
        };
        log::info!(
            "Admin {} finalized withdrawal {} as {}",
            admin.id,
            tx.id,
            tx.status
        );

        self.publish_decision(
            admin,
            chat_id,
            message_id,
            &tx,
            outcome,
            texts::decision_for_user(&tx, None),
        )
        .await;

        Ok(format!("Withdrawal {}", tx.status))
    }
}
