use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::referrals::{ReferralEdge, ReferralSummary};
use crate::models::reports::LedgerStats;
use crate::models::transactions::{ApprovalMessage, NewTransaction, Outcome, Transaction};
use crate::models::users::{Profile, User, UserId};

mod memory;
mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("user {0} already exists")]
    DuplicateUser(UserId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),
    #[error("transaction {} is already {}", .0.id, .0.status)]
    AlreadyFinalized(Box<Transaction>),
    #[error("commission for referred user {0} was already credited")]
    DuplicateReferral(UserId),
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Unavailable(e.to_string())
    }
}

/// Durable record of users, balances and transactions.
///
/// Every balance change goes through `finalize_transaction` or
/// `credit_commission`, and both are a single atomic unit in every
/// implementation: the status check and the balance delta can never be
/// observed apart.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `DuplicateUser` when the id is already registered.
    async fn create_user(
        &self,
        profile: &Profile,
        referred_by: Option<UserId>,
    ) -> Result<User, LedgerError>;

    /// Overwrites the profile fields only. Balance and referral linkage stay.
    async fn update_profile(&self, profile: &Profile) -> Result<User, LedgerError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError>;

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerError>;

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, LedgerError>;

    async fn recent_users(&self, limit: i64) -> Result<Vec<User>, LedgerError>;

    /// Records a `pending` transaction. Withdrawals also store the destination
    /// wallet on the user in the same unit.
    async fn raise_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError>;

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError>;

    async fn latest_pending_deposit(
        &self,
        user_id: UserId,
        plan_id: &str,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Oldest first.
    async fn pending_transactions(&self, limit: i64) -> Result<Vec<Transaction>, LedgerError>;

    /// Earliest completed deposit, by completion time.
    async fn first_completed_deposit(
        &self,
        user_id: UserId,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Moves a pending transaction to its terminal status and applies the
    /// balance delta when completed. A completed plan deposit also sets the
    /// user's subscription tier. Anything but `pending` yields
    /// `AlreadyFinalized` and changes nothing.
    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: Outcome,
    ) -> Result<Transaction, LedgerError>;

    /// Pays `amount` to the referrer through a completed commission
    /// transaction. At most once per referred user.
    async fn credit_commission(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        amount: Decimal,
    ) -> Result<ReferralEdge, LedgerError>;

    async fn referral_edge(&self, referred_id: UserId) -> Result<Option<ReferralEdge>, LedgerError>;

    async fn referral_summary(&self, referrer_id: UserId) -> Result<ReferralSummary, LedgerError>;

    async fn record_approval_message(&self, approval: &ApprovalMessage) -> Result<(), LedgerError>;

    async fn approval_message(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<ApprovalMessage>, LedgerError>;

    /// Aggregates in one snapshot; `since` bounds the "today" counters.
    async fn stats(&self, since: DateTime<Utc>) -> Result<LedgerStats, LedgerError>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
