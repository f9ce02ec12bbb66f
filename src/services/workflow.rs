use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::locks::{UserLocks, UserSequencer};
use super::notifications::Notifier;
use super::scheduler::ReportKind;
use super::{RequestHandler, Service, ServiceError};
use crate::models::conversation::ConversationState;
use crate::models::plans::PlanCatalog;
use crate::models::users::UserId;
use crate::repositories::conversations::ConversationStoreRef;
use crate::repositories::ledger::LedgerStoreRef;
use crate::settings::Settings;
use crate::transport::{ChatId, InboundEvent, Keyboard, MessageId, PhotoRef, Sender};

pub mod actions;
mod admin;
mod messaging;
mod registration;
mod reports;
mod subscriptions;
pub mod texts;
mod withdrawals;

use actions::Action;

/// Everything the engine reads from configuration.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub admin_ids: HashSet<UserId>,
    pub admin_channel: ChatId,
    pub archive_channel: ChatId,
    pub payment_wallet: String,
    pub payment_network: String,
    pub bot_username: String,
    pub commission_percent: Decimal,
    pub withdrawal_minimum: Decimal,
    pub amount_options: Vec<Decimal>,
    pub wallet_prefixes: Vec<String>,
    pub catalog: PlanCatalog,
}

impl WorkflowConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        WorkflowConfig {
            admin_ids: settings.admins.user_ids.iter().copied().collect(),
            admin_channel: settings.channels.admin,
            archive_channel: settings.channels.archive,
            payment_wallet: settings.payments.wallet_address.clone(),
            payment_network: settings.payments.network.clone(),
            bot_username: settings.telegram.bot_username.clone(),
            commission_percent: settings.referrals.commission_percent,
            withdrawal_minimum: settings.withdrawals.minimum,
            amount_options: settings.withdrawals.amount_options.clone(),
            wallet_prefixes: settings.withdrawals.wallet_prefixes.clone(),
            catalog: PlanCatalog::new(settings.plans.clone()),
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Advisory shape check only. The admin reviewing the request is the
    /// real authority on the address.
    pub fn is_valid_wallet(&self, address: &str) -> bool {
        address.chars().count() >= 10
            && !address.chars().any(char::is_whitespace)
            && self
                .wallet_prefixes
                .iter()
                .any(|prefix| address.starts_with(prefix.as_str()))
    }

    fn is_service_chat(&self, chat_id: ChatId) -> bool {
        chat_id == self.admin_channel || chat_id == self.archive_channel
    }
}

/// The conversation state machine.
///
/// Every event runs under the actor's user lock. Admin decisions also take
/// the lock of the user who owns the transaction. Ledger writes always land
/// before the conversation slot changes, so a failed write leaves the slot as
/// it was.
#[derive(Clone)]
pub struct WorkflowEngine {
    ledger: LedgerStoreRef,
    conversations: ConversationStoreRef,
    notifier: Notifier,
    locks: UserLocks,
    config: Arc<WorkflowConfig>,
}

impl WorkflowEngine {
    pub fn new(
        ledger: LedgerStoreRef,
        conversations: ConversationStoreRef,
        notifier: Notifier,
        config: WorkflowConfig,
    ) -> Self {
        WorkflowEngine {
            ledger,
            conversations,
            notifier,
            locks: UserLocks::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<(), ServiceError> {
        match self.process(&event).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report_failure(&event, &e).await;
                Err(e)
            }
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<(), ServiceError> {
        let keys = self.lock_keys(event).await?;
        let _guards = self.locks.lock_all(keys).await;

        let sender = event.sender();
        if !self.config.is_admin(sender.id) && self.is_deactivated(sender.id).await? {
            if let InboundEvent::Button { callback_id, .. } = event {
                self.answer(callback_id, None).await;
            }
            self.send(sender.id, texts::DEACTIVATED, None).await;
            return Ok(());
        }

        match event {
            InboundEvent::Text {
                from,
                chat_id,
                text,
            } => self.handle_text(from, *chat_id, text.trim()).await,
            InboundEvent::Photo {
                from,
                chat_id,
                photo,
                caption,
            } => {
                self.handle_photo(from, *chat_id, photo, caption.as_deref())
                    .await
            }
            InboundEvent::Button {
                from,
                chat_id,
                callback_id,
                message_id,
                data,
            } => {
                let answer = self.handle_button(from, *chat_id, *message_id, data).await?;
                self.answer(callback_id, answer).await;
                Ok(())
            }
        }
    }

    /// Users whose state this event may touch, besides the actor.
    async fn lock_keys(&self, event: &InboundEvent) -> Result<Vec<UserId>, ServiceError> {
        let actor = event.sender().id;
        let mut keys = vec![actor];

        if let InboundEvent::Button { data, .. } = event {
            let target = match data.parse::<Action>() {
                Ok(action) if self.config.is_admin(actor) => action.decision_target(),
                _ => None,
            };
            if let Some(id) = target {
                if let Some(tx) = self.ledger.find_transaction(id).await? {
                    keys.push(tx.user_id);
                }
            }
        }

        Ok(keys)
    }

    async fn is_deactivated(&self, user_id: UserId) -> Result<bool, ServiceError> {
        Ok(self
            .ledger
            .find_user(user_id)
            .await?
            .map(|user| !user.is_active)
            .unwrap_or(false))
    }

    async fn handle_text(
        &self,
        from: &Sender,
        chat_id: ChatId,
        text: &str,
    ) -> Result<(), ServiceError> {
        if let Some(command) = text.strip_prefix('/') {
            return self.handle_command(from, chat_id, command).await;
        }

        match self.conversations.get(from.id).await? {
            ConversationState::AwaitingRegistration { referral_code } => {
                self.complete_registration(from, chat_id, text, referral_code)
                    .await
            }
            ConversationState::AwaitingWalletAddress { kind, amount } => {
                self.submit_wallet(from, chat_id, text, kind, amount).await
            }
            ConversationState::AwaitingAdminReplyTarget { target_user_id }
            | ConversationState::AwaitingAdminFreeMessage { target_user_id }
                if self.config.is_admin(from.id) =>
            {
                self.deliver_admin_message(from, chat_id, target_user_id, text)
                    .await
            }
            _ => self.forward_text(from, chat_id, text).await,
        }
    }

    async fn handle_photo(
        &self,
        from: &Sender,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: Option<&str>,
    ) -> Result<(), ServiceError> {
        match self.conversations.get(from.id).await? {
            ConversationState::AwaitingPaymentProof { plan_id } => {
                self.submit_payment_proof(from, chat_id, &plan_id, photo)
                    .await
            }
            _ => self.forward_photo(from, chat_id, photo, caption).await,
        }
    }

    async fn handle_command(
        &self,
        from: &Sender,
        chat_id: ChatId,
        command: &str,
    ) -> Result<(), ServiceError> {
        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, Some(argument.trim())),
            None => (command, None),
        };
        // Group chats address commands as /name@bot.
        let name = name.split('@').next().unwrap_or(name);
        let is_admin = self.config.is_admin(from.id);

        match name {
            "start" => self.start(from, chat_id, argument).await,
            "help" => {
                self.send(chat_id, texts::help(is_admin), None).await;
                Ok(())
            }
            "ping" => {
                self.send(chat_id, texts::PONG, None).await;
                Ok(())
            }
            "cancel" => {
                self.conversations.clear(from.id).await?;
                self.send(chat_id, texts::cancelled(), Some(texts::main_menu()))
                    .await;
                Ok(())
            }
            "balance" => self.show_balance(from, chat_id).await,
            "panel" | "stats" | "users" | "pending" | "deactivate" | "activate" if !is_admin => {
                Err(ServiceError::Unauthorized(from.id))
            }
            "panel" => {
                self.send(chat_id, "🛠 Admin panel", Some(texts::admin_panel()))
                    .await;
                Ok(())
            }
            "stats" => self.show_stats(chat_id).await,
            "users" => self.show_recent_users(chat_id).await,
            "pending" => self.show_pending(chat_id).await,
            "deactivate" => self.set_user_active(chat_id, "deactivate", argument, false).await,
            "activate" => self.set_user_active(chat_id, "activate", argument, true).await,
            _ => {
                self.send(chat_id, texts::unknown_command(), None).await;
                Ok(())
            }
        }
    }

    /// Returns the text to show on the pressed button's toast.
    async fn handle_button(
        &self,
        from: &Sender,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        data: &str,
    ) -> Result<Option<String>, ServiceError> {
        let action = match data.parse::<Action>() {
            Ok(action) => action,
            Err(e) => {
                log::warn!("Ignoring button from {}: {}", from.id, e);
                return Ok(Some(texts::REQUEST_UNAVAILABLE.to_string()));
            }
        };

        if action.is_admin_only() && !self.config.is_admin(from.id) {
            return Err(ServiceError::Unauthorized(from.id));
        }

        match action {
            Action::MainMenu => self.show_main_menu(from, chat_id).await?,
            Action::Plans => self.show_plans(from, chat_id).await?,
            Action::Balance => self.show_balance(from, chat_id).await?,
            Action::Referral => self.show_referral(from, chat_id).await?,
            Action::Withdraw => self.show_withdraw_menu(from, chat_id).await?,
            Action::WithdrawProfits => self.show_amount_picker(from, chat_id).await?,
            Action::WithdrawBonus => self.request_bonus_withdrawal(from, chat_id).await?,
            Action::Subscribe(plan_id) => self.subscribe(from, chat_id, &plan_id).await?,
            Action::ConfirmPayment(plan_id) => {
                self.confirm_payment(from, chat_id, &plan_id).await?
            }
            Action::WithdrawAmount(amount) => {
                self.request_withdrawal(from, chat_id, amount).await?
            }
            Action::ApproveTx(id) => {
                return self
                    .decide_deposit(from, chat_id, message_id, id, true)
                    .await
                    .map(Some)
            }
            Action::RejectTx(id) => {
                return self
                    .decide_deposit(from, chat_id, message_id, id, false)
                    .await
                    .map(Some)
            }
            Action::ApproveWd(id) => {
                return self
                    .decide_withdrawal(from, chat_id, message_id, id, true)
                    .await
                    .map(Some)
            }
            Action::RejectWd(id) => {
                return self
                    .decide_withdrawal(from, chat_id, message_id, id, false)
                    .await
                    .map(Some)
            }
            Action::Reply(user_id) => {
                self.start_admin_message(
                    from,
                    chat_id,
                    ConversationState::AwaitingAdminFreeMessage {
                        target_user_id: user_id,
                    },
                )
                .await?
            }
            Action::MessageUser(user_id) => {
                self.start_admin_message(
                    from,
                    chat_id,
                    ConversationState::AwaitingAdminReplyTarget {
                        target_user_id: user_id,
                    },
                )
                .await?
            }
            Action::AdminStats => self.show_stats(chat_id).await?,
            Action::AdminUsers => self.show_recent_users(chat_id).await?,
            Action::AdminPending => self.show_pending(chat_id).await?,
            Action::AdminWallets => self.show_wallets(chat_id).await,
        }

        Ok(None)
    }

    /// Tells the actor what happened without raw detail and escalates
    /// anything unexpected to the admin channel.
    async fn report_failure(&self, event: &InboundEvent, error: &ServiceError) {
        let sender = event.sender();
        let callback_id = match event {
            InboundEvent::Button { callback_id, .. } => Some(callback_id.as_str()),
            _ => None,
        };

        match error {
            ServiceError::Unauthorized(_) => match callback_id {
                Some(callback_id) => {
                    self.answer(callback_id, Some(texts::NOT_ALLOWED.to_string()))
                        .await
                }
                None => {
                    self.send(event.chat_id(), texts::ADMINS_ONLY, None).await;
                }
            },
            ServiceError::Validation(message) => {
                if let Some(callback_id) = callback_id {
                    self.answer(callback_id, None).await;
                }
                self.send(event.chat_id(), message.clone(), None).await;
            }
            ServiceError::NotFound(what) => {
                log::info!("Event from {} referenced a missing {}", sender.id, what);
                match callback_id {
                    Some(callback_id) => {
                        self.answer(callback_id, Some(texts::REQUEST_UNAVAILABLE.to_string()))
                            .await
                    }
                    None => {
                        self.send(event.chat_id(), texts::REQUEST_UNAVAILABLE, None)
                            .await;
                    }
                }
            }
            error => {
                log::error!("Failed to handle event from {}: {}", sender.id, error);
                if let Some(callback_id) = callback_id {
                    self.answer(callback_id, None).await;
                }

                let (_, _) = join(
                    self.send(event.chat_id(), texts::GENERIC_FAILURE, None),
                    self.send(
                        self.config.admin_channel,
                        texts::failure_report(sender, &error.to_string()),
                        None,
                    ),
                )
                .await;
            }
        }
    }

    /// Best-effort send. The dispatcher has already retried and escalated by
    /// the time an error comes back.
    async fn send(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        keyboard: Option<Keyboard>,
    ) -> Option<MessageId> {
        match self.notifier.text(chat_id, text, keyboard).await {
            Ok(message_id) => message_id,
            Err(e) => {
                log::warn!("Message to {} not delivered: {}", chat_id, e);
                None
            }
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<String>) {
        if let Err(e) = self.notifier.answer(callback_id, text).await {
            log::debug!("Button answer {} not delivered: {}", callback_id, e);
        }
    }
}

pub enum WorkflowRequest {
    Event(InboundEvent),
    Report(ReportKind),
}

#[derive(Clone)]
pub struct WorkflowRequestHandler {
    engine: WorkflowEngine,
}

impl WorkflowRequestHandler {
    pub fn new(engine: WorkflowEngine) -> Self {
        WorkflowRequestHandler { engine }
    }

    fn prune(&self) {
        self.engine.locks.prune();
    }
}

#[async_trait]
impl RequestHandler<WorkflowRequest> for WorkflowRequestHandler {
    async fn handle_request(&self, request: WorkflowRequest) {
        match request {
            WorkflowRequest::Event(event) => {
                let user_id = event.sender().id;
                if let Err(e) = self.engine.handle_event(event).await {
                    log::debug!("Event from {} ended with: {}", user_id, e);
                }
            }
            WorkflowRequest::Report(kind) => {
                if let Err(e) = self.engine.emit_report(kind).await {
                    log::error!("Could not emit {:?} report: {}", kind, e);
                }
            }
        }
    }
}

const PRUNE_EVERY: u64 = 256;

pub struct WorkflowService {
    sequencer: UserSequencer,
}

impl WorkflowService {
    pub fn new() -> Self {
        WorkflowService {
            sequencer: UserSequencer::new(),
        }
    }
}

#[async_trait]
impl Service<WorkflowRequest, WorkflowRequestHandler> for WorkflowService {
    /// Same fan-out as the default loop, but events of one user run in the
    /// order they were received.
    async fn run(
        &mut self,
        handler: WorkflowRequestHandler,
        receiver: &mut mpsc::Receiver<WorkflowRequest>,
    ) {
        let mut received: u64 = 0;

        while let Some(request) = receiver.recv().await {
            let ticket = match &request {
                WorkflowRequest::Event(event) => Some(self.sequencer.ticket(event.sender().id)),
                WorkflowRequest::Report(_) => None,
            };
            let request_handler = handler.clone();

            tokio::spawn(async move {
                let _turn = match ticket {
                    Some(ticket) => Some(ticket.wait().await),
                    None => None,
                };
                request_handler.handle_request(request).await;
            });

            received += 1;
            if received % PRUNE_EVERY == 0 {
                self.sequencer.prune();
                handler.prune();
            }
        }
    }
}
