#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;

use ledger_bot::models::conversation::ConversationState;
use ledger_bot::models::plans::{Plan, PlanCatalog};
use ledger_bot::models::referrals::{ReferralEdge, ReferralSummary};
use ledger_bot::models::reports::LedgerStats;
use ledger_bot::models::transactions::{
    ApprovalMessage, NewTransaction, Outcome, Transaction, TransactionKind,
};
use ledger_bot::models::users::{Profile, User, UserId};
use ledger_bot::repositories::conversations::{ConversationStore, MemoryConversationStore};
use ledger_bot::repositories::ledger::{LedgerError, LedgerStore, MemoryLedgerStore};
use ledger_bot::services::notifications::{
    NotificationRequestHandler, NotificationService, Notifier, RetryPolicy,
};
use ledger_bot::services::workflow::{WorkflowConfig, WorkflowEngine};
use ledger_bot::services::{Service, ServiceError};
use ledger_bot::transport::{
    ChatId, InboundEvent, Keyboard, MessageId, PhotoRef, Sender, Transport, TransportError,
};

pub const ADMIN: UserId = 900;
pub const ADMIN_CHANNEL: ChatId = -100;
pub const ARCHIVE_CHANNEL: ChatId = -200;
pub const WALLET: &str = "TXwalletAddress0001";

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
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
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

impl Sent {
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Sent::Text { chat_id, .. } | Sent::Photo { chat_id, .. } | Sent::Edit { chat_id, .. } => {
                Some(*chat_id)
            }
            Sent::Answer { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } | Sent::Edit { text, .. } => Some(text.as_str()),
            Sent::Photo { caption, .. } => Some(caption.as_str()),
            Sent::Answer { text, .. } => text.as_deref(),
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Sent::Text { keyboard, .. } | Sent::Photo { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}

/// Records everything the engine sends. Chats marked unreachable fail
/// permanently.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
    unreachable: Mutex<HashSet<ChatId>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn make_unreachable(&self, chat_id: ChatId) {
        self.unreachable.lock().unwrap().insert(chat_id);
    }

    fn record(&self, chat_id: Option<ChatId>, sent: Sent) -> Result<MessageId, TransportError> {
        if let Some(chat_id) = chat_id {
            if self.unreachable.lock().unwrap().contains(&chat_id) {
                return Err(TransportError::Permanent("chat not found".into()));
            }
        }
        self.sent.lock().unwrap().push(sent);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        self.record(
            Some(chat_id),
            Sent::Text {
                chat_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        )
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.record(
            Some(chat_id),
            Sent::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            },
        )
        .map(|_| ())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        self.record(
            Some(chat_id),
            Sent::Photo {
                chat_id,
                photo: photo.clone(),
                caption: caption.to_string(),
                keyboard: keyboard.cloned(),
            },
        )
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(
            None,
            Sent::Answer {
                callback_id: callback_id.to_string(),
                text: text.map(str::to_string),
            },
        )
        .map(|_| ())
    }
}

/// In-memory ledger whose writes can be switched to fail, all at once or
/// one operation at a time.
#[derive(Default)]
pub struct FlakyLedger {
    inner: MemoryLedgerStore,
    failing: AtomicBool,
    failing_approvals: AtomicBool,
    failing_commissions: AtomicBool,
}

impl FlakyLedger {
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_approval_records(&self, failing: bool) {
        self.failing_approvals.store(failing, Ordering::SeqCst);
    }

    pub fn fail_commissions(&self, failing: bool) {
        self.failing_commissions.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), LedgerError> {
        Self::check_flag(&self.failing)
    }

    fn check_flag(flag: &AtomicBool) -> Result<(), LedgerError> {
        match flag.load(Ordering::SeqCst) {
            true => Err(LedgerError::Unavailable("connection reset".into())),
            false => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyLedger {
    async fn create_user(
        &self,
        profile: &Profile,
        referred_by: Option<UserId>,
    ) -> Result<User, LedgerError> {
        self.check()?;
        self.inner.create_user(profile, referred_by).await
    }

    async fn update_profile(&self, profile: &Profile) -> Result<User, LedgerError> {
        self.check()?;
        self.inner.update_profile(profile).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerError> {
        self.inner.find_user_by_referral_code(code).await
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, LedgerError> {
        self.check()?;
        self.inner.set_active(id, active).await
    }

    async fn recent_users(&self, limit: i64) -> Result<Vec<User>, LedgerError> {
        self.inner.recent_users(limit).await
    }

    async fn raise_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        self.check()?;
        self.inner.raise_transaction(new).await
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        self.inner.find_transaction(id).await
    }

    async fn latest_pending_deposit(
        &self,
        user_id: UserId,
        plan_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.inner.latest_pending_deposit(user_id, plan_id).await
    }

    async fn pending_transactions(&self, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.pending_transactions(limit).await
    }

    async fn first_completed_deposit(
        &self,
        user_id: UserId,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.inner.first_completed_deposit(user_id).await
    }

    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: Outcome,
    ) -> Result<Transaction, LedgerError> {
        self.check()?;
        self.inner.finalize_transaction(id, outcome).await
    }

    async fn credit_commission(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        amount: Decimal,
    ) -> Result<ReferralEdge, LedgerError> {
        self.check()?;
        Self::check_flag(&self.failing_commissions)?;
        self.inner
            .credit_commission(referrer_id, referred_id, amount)
            .await
    }

    async fn referral_edge(&self, referred_id: UserId) -> Result<Option<ReferralEdge>, LedgerError> {
        self.inner.referral_edge(referred_id).await
    }

    async fn referral_summary(&self, referrer_id: UserId) -> Result<ReferralSummary, LedgerError> {
        self.inner.referral_summary(referrer_id).await
    }

    async fn record_approval_message(&self, approval: &ApprovalMessage) -> Result<(), LedgerError> {
        self.check()?;
        Self::check_flag(&self.failing_approvals)?;
        self.inner.record_approval_message(approval).await
    }

    async fn approval_message(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<ApprovalMessage>, LedgerError> {
        self.inner.approval_message(transaction_id).await
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<LedgerStats, LedgerError> {
        self.inner.stats(since).await
    }
}

pub fn plans() -> Vec<Plan> {
    [("basic", "Basic", dec!(25)), ("pro", "Pro", dec!(50)), ("vip", "VIP", dec!(100))]
        .into_iter()
        .map(|(id, name, price)| Plan {
            id: id.to_string(),
            name: name.to_string(),
            price,
            days: 30,
            returns: "5-10% daily".to_string(),
        })
        .collect()
}

pub fn config() -> WorkflowConfig {
    WorkflowConfig {
        admin_ids: HashSet::from([ADMIN]),
        admin_channel: ADMIN_CHANNEL,
        archive_channel: ARCHIVE_CHANNEL,
        payment_wallet: "TPaymentWallet00000000000000000000".to_string(),
        payment_network: "TRC20".to_string(),
        bot_username: "ledger_test_bot".to_string(),
        commission_percent: dec!(10),
        withdrawal_minimum: dec!(25),
        amount_options: vec![dec!(25), dec!(50), dec!(100), dec!(250), dec!(500), dec!(1000)],
        wallet_prefixes: ["T", "0x", "1", "3", "bc1"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        catalog: PlanCatalog::new(plans()),
    }
}

pub fn sender(id: UserId) -> Sender {
    Sender {
        id,
        first_name: format!("User{}", id),
        username: Some(format!("user{}", id)),
    }
}

pub struct Harness {
    pub engine: WorkflowEngine,
    pub ledger: Arc<FlakyLedger>,
    pub conversations: Arc<MemoryConversationStore>,
    pub transport: Arc<RecordingTransport>,
    callbacks: AtomicI64,
}

impl Harness {
    pub fn new() -> Self {
        let ledger = Arc::new(FlakyLedger::default());
        let conversations = Arc::new(MemoryConversationStore::default());
        let transport = Arc::new(RecordingTransport::default());

        let (notification_tx, mut notification_rx) = mpsc::channel(64);
        let handler = NotificationRequestHandler::new(
            transport.clone(),
            RetryPolicy::new(3, Duration::from_millis(1)),
            ADMIN_CHANNEL,
        );
        tokio::spawn(async move {
            NotificationService::new()
                .run(handler, &mut notification_rx)
                .await;
        });

        let engine = WorkflowEngine::new(
            ledger.clone(),
            conversations.clone(),
            Notifier::new(notification_tx),
            config(),
        );

        Harness {
            engine,
            ledger,
            conversations,
            transport,
            callbacks: AtomicI64::new(0),
        }
    }

    pub async fn text(&self, user: UserId, text: &str) -> Result<(), ServiceError> {
        self.engine
            .handle_event(InboundEvent::Text {
                from: sender(user),
                chat_id: user,
                text: text.to_string(),
            })
            .await
    }

    pub async fn photo(&self, user: UserId, file_id: &str) -> Result<(), ServiceError> {
        self.engine
            .handle_event(InboundEvent::Photo {
                from: sender(user),
                chat_id: user,
                photo: PhotoRef(file_id.to_string()),
                caption: None,
            })
            .await
    }

    /// Presses a button in the user's private chat.
    pub async fn press(&self, user: UserId, action: impl ToString) -> Result<(), ServiceError> {
        self.press_in(user, user, action).await
    }

    /// Presses a button on a card in the admin channel.
    pub async fn admin_press(&self, action: impl ToString) -> Result<(), ServiceError> {
        self.press_in(ADMIN, ADMIN_CHANNEL, action).await
    }

    pub async fn press_in(
        &self,
        user: UserId,
        chat_id: ChatId,
        action: impl ToString,
    ) -> Result<(), ServiceError> {
        let callback = self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.engine
            .handle_event(InboundEvent::Button {
                from: sender(user),
                chat_id,
                callback_id: format!("cb-{}", callback),
                message_id: None,
                data: action.to_string(),
            })
            .await
    }

    /// Runs `/start [code]` and the three-line registration reply.
    pub async fn register(&self, user: UserId, referral_code: Option<&str>) -> User {
        let start = match referral_code {
            Some(code) => format!("/start {}", code),
            None => "/start".to_string(),
        };
        self.text(user, &start).await.unwrap();
        self.text(user, &format!("User {}\n+1555000{}\nCanada", user, user))
            .await
            .unwrap();

        self.user(user).await
    }

    pub async fn user(&self, user: UserId) -> User {
        self.ledger.find_user(user).await.unwrap().unwrap()
    }

    pub async fn balance(&self, user: UserId) -> Decimal {
        self.user(user).await.balance
    }

    pub async fn state(&self, user: UserId) -> ConversationState {
        self.conversations.get(user).await.unwrap()
    }

    pub async fn pending(&self, user: UserId, kind: TransactionKind) -> Vec<Transaction> {
        self.ledger
            .pending_transactions(1000)
            .await
            .unwrap()
            .into_iter()
            .filter(|tx| tx.user_id == user && tx.kind == kind)
            .collect()
    }

    /// Pays for `plan_id` and submits a proof photo; returns the pending deposit.
    pub async fn buy_plan(&self, user: UserId, plan_id: &str) -> Transaction {
        self.press(user, format!("subscribe:{}", plan_id)).await.unwrap();
        self.press(user, format!("confirm_payment:{}", plan_id))
            .await
            .unwrap();
        self.photo(user, "proof-file").await.unwrap();

        let mut pending = self.pending(user, TransactionKind::Deposit).await;
        assert_eq!(pending.len(), 1, "expected exactly one pending deposit");
        pending.remove(0)
    }

    /// Credits `amount` through an approved deposit so balances stay
    /// consistent with the ledger.
    pub async fn fund(&self, user: UserId, amount: Decimal) {
        let tx = self
            .ledger
            .raise_transaction(NewTransaction::deposit(user, amount, "basic"))
            .await
            .unwrap();
        self.ledger
            .finalize_transaction(tx.id, Outcome::Completed)
            .await
            .unwrap();
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.transport.sent()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.chat_id() == Some(chat_id))
            .collect()
    }

    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .filter_map(|sent| sent.body().map(str::to_string))
            .collect()
    }

    pub fn last_text_to(&self, chat_id: ChatId) -> String {
        self.texts_to(chat_id).pop().unwrap_or_default()
    }

    pub fn answers(&self) -> Vec<Option<String>> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Answer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}
