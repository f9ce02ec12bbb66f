use rust_decimal::Decimal;
use uuid::Uuid;

use super::admin::Decision;
use super::{texts, WorkflowEngine};
use crate::models::conversation::ConversationState;
use crate::models::plans::Plan;
use crate::models::transactions::{NewTransaction, Outcome, Transaction, TransactionKind};
use crate::models::users::User;
use crate::repositories::ledger::LedgerError;
use crate::services::ServiceError;
use crate::transport::{ChatId, MessageId, PhotoRef, Sender};

impl WorkflowEngine {
    fn plan(&self, plan_id: &str) -> Result<Plan, ServiceError> {
        self.config
            .catalog
            .find(plan_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("plan {}", plan_id)))
    }

    /// Reuses the open deposit for this plan so repeated taps and proof
    /// retries never pile up pending rows.
    async fn pending_deposit(&self, user: &User, plan: &Plan) -> Result<Transaction, ServiceError> {
        if let Some(tx) = self.ledger.latest_pending_deposit(user.id, &plan.id).await? {
            return Ok(tx);
        }

        let tx = self
            .ledger
            .raise_transaction(NewTransaction::deposit(user.id, plan.price, &plan.id))
            .await?;
        log::info!(
            "Raised deposit {} of {} for user {} (plan {})",
            tx.id,
            tx.amount,
            user.id,
            plan.id
        );

        Ok(tx)
    }

    pub(super) async fn show_plans(&self, from: &Sender, chat_id: ChatId) -> Result<(), ServiceError> {
        if self.registered_user(from, chat_id).await?.is_none() {
            return Ok(());
        }

        let (text, keyboard) = texts::plan_catalog(self.config.catalog.plans());
        self.send(chat_id, text, Some(keyboard)).await;
        Ok(())
    }

    pub(super) async fn subscribe(
        &self,
        from: &Sender,
        chat_id: ChatId,
        plan_id: &str,
    ) -> Result<(), ServiceError> {
        let plan = self.plan(plan_id)?;
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };

        let tx = self.pending_deposit(&user, &plan).await?;

        let (text, keyboard) = texts::payment_instructions(
            &plan,
            &self.config.payment_wallet,
            &self.config.payment_network,
        );
        self.send(chat_id, text, Some(keyboard)).await;
        self.send(
            self.config.admin_channel,
            texts::admin_plan_selected(&user, &plan, &tx),
            None,
        )
        .await;

        Ok(())
    }

    pub(super) async fn confirm_payment(
        &self,
        from: &Sender,
        chat_id: ChatId,
        plan_id: &str,
    ) -> Result<(), ServiceError> {
        let plan = self.plan(plan_id)?;
        if self.registered_user(from, chat_id).await?.is_none() {
            return Ok(());
        }

        self.conversations
            .set(
                from.id,
                ConversationState::AwaitingPaymentProof {
                    plan_id: plan.id.clone(),
                },
            )
            .await?;
        self.send(chat_id, texts::proof_prompt(&plan), None).await;

        Ok(())
    }

    pub(super) async fn submit_payment_proof(
        &self,
        from: &Sender,
        chat_id: ChatId,
        plan_id: &str,
        photo: &PhotoRef,
    ) -> Result<(), ServiceError> {
        let plan = match self.plan(plan_id) {
            Ok(plan) => plan,
            Err(e) => {
                self.conversations.clear(from.id).await?;
                return Err(e);
            }
        };
        let Some(user) = self.registered_user(from, chat_id).await? else {
            return Ok(());
        };

        let tx = self.pending_deposit(&user, &plan).await?;

        let (caption, keyboard) = texts::deposit_card(&user, &plan, &tx);
        let message_id = match self
            .notifier
            .photo(self.config.admin_channel, photo.clone(), caption, Some(keyboard))
            .await
        {
            Ok(Some(message_id)) => message_id,
            result => {
                log::warn!(
                    "Payment proof for {} not forwarded: {:?}",
                    tx.id,
                    result.err()
                );
                self.send(chat_id, texts::proof_not_forwarded(), None).await;
                return Ok(());
            }
        };

        self.record_approval(&tx, message_id).await;
        self.conversations.clear(from.id).await?;

        self.send(chat_id, texts::proof_received(), Some(texts::main_menu()))
            .await;
        Ok(())
    }

    pub(super) async fn decide_deposit(
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

        let tx = match self.finalize(id, TransactionKind::Deposit, outcome).await? {
            Decision::Applied(tx) => tx,
            Decision::AlreadyHandled(tx) => return Ok(texts::already_handled(&tx)),
        };
        log::info!("Admin {} finalized deposit {} as {}", admin.id, tx.id, tx.status);

        if outcome == Outcome::Completed {
            if let Err(e) = self.pay_referral_commission(&tx).await {
                log::error!("Commission for deposit {} failed: {}", tx.id, e);
                self.send(
                    self.config.admin_channel,
                    format!("🚨 Referral commission for deposit {} failed: {}", tx.id, e),
                    None,
                )
                .await;
            }
        }

        let plan = tx
            .plan_id
            .as_deref()
            .and_then(|plan_id| self.config.catalog.find(plan_id));
        self.publish_decision(
            admin,
            chat_id,
            message_id,
            &tx,
            outcome,
            texts::decision_for_user(&tx, plan),
        )
        .await;

        Ok(format!("Deposit {}", tx.status))
    }

    /// Pays the referrer once per referred user, sized on that user's first
    /// completed deposit. Runs on every completed deposit until an edge
    /// exists, so a failed credit is retried on the next approval.
    async fn pay_referral_commission(&self, deposit: &Transaction) -> Result<(), ServiceError> {
        if self.ledger.referral_edge(deposit.user_id).await?.is_some() {
            return Ok(());
        }
        let Some(user) = self.ledger.find_user(deposit.user_id).await? else {
            return Ok(());
        };
        let Some(referrer_id) = user.referred_by else {
            return Ok(());
        };
        let Some(first) = self.ledger.first_completed_deposit(user.id).await? else {
            return Ok(());
        };

        let commission = commission_for(first.amount, self.config.commission_percent);
        if commission <= Decimal::ZERO {
            return Ok(());
        }

        match self
            .ledger
            .credit_commission(referrer_id, user.id, commission)
            .await
        {
            Ok(edge) => {
                log::info!(
                    "Credited {} commission to {} for referred user {}",
                    edge.commission,
                    edge.referrer_id,
                    edge.referred_id
                );
                self.send(
                    referrer_id,
                    texts::commission_earned(edge.commission, &user),
                    None,
                )
                .await;
                Ok(())
            }
            Err(LedgerError::DuplicateReferral(_)) => {
                log::debug!("Commission for user {} already paid", user.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn commission_for(amount: Decimal, percent: Decimal) -> Decimal {
    (amount * percent / Decimal::ONE_HUNDRED).round_dp(8)
}
