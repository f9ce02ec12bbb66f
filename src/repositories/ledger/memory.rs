use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LedgerError, LedgerStore};
use crate::models::referrals::{ReferralEdge, ReferralSummary};
use crate::models::reports::LedgerStats;
use crate::models::transactions::{
    ApprovalMessage, NewTransaction, Outcome, Transaction, TransactionKind, TransactionStatus,
};
use crate::models::users::{Profile, User, UserId};

#[derive(Default)]
struct LedgerState {
    users: HashMap<UserId, User>,
    transactions: HashMap<Uuid, Transaction>,
    referral_edges: HashMap<UserId, ReferralEdge>,
    approvals: HashMap<Uuid, ApprovalMessage>,
}

/// A ledger kept behind one `RwLock`.
///
/// Every mutating operation takes the write lock for its whole duration,
/// which makes it atomic with respect to every other operation. Used for
/// tests and for running the bot without a database.
#[derive(Default, Clone)]
pub struct MemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_user(
        &self,
        profile: &Profile,
        referred_by: Option<UserId>,
    ) -> Result<User, LedgerError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&profile.id) {
            return Err(LedgerError::DuplicateUser(profile.id));
        }

        let user = User {
            id: profile.id,
            full_name: profile.full_name.clone(),
            phone: profile.phone.clone(),
            country: profile.country.clone(),
            username: profile.username.clone(),
            balance: Decimal::ZERO,
            referral_code: User::referral_code_for(profile.id),
            referred_by,
            subscription_tier: None,
            wallet_address: None,
            registered_at: Utc::now(),
            is_active: true,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update_profile(&self, profile: &Profile) -> Result<User, LedgerError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&profile.id)
            .ok_or(LedgerError::UserNotFound(profile.id))?;

        user.full_name = profile.full_name.clone();
        user.phone = profile.phone.clone();
        user.country = profile.country.clone();
        user.username = profile.username.clone();

        Ok(user.clone())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.referral_code == code)
            .cloned())
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, LedgerError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or(LedgerError::UserNotFound(id))?;
        user.is_active = active;

        Ok(user.clone())
    }

    async fn recent_users(&self, limit: i64) -> Result<Vec<User>, LedgerError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        users.truncate(limit.max(0) as usize);

        Ok(users)
    }

    async fn raise_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&new.user_id)
            .ok_or(LedgerError::UserNotFound(new.user_id))?;

        if new.kind == TransactionKind::Withdrawal {
            if let Some(wallet) = &new.wallet_address {
                user.wallet_address = Some(wallet.clone());
            }
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            amount: new.amount,
            status: TransactionStatus::Pending,
            plan_id: new.plan_id,
            wallet_address: new.wallet_address,
            created_at: Utc::now(),
            finalized_at: None,
        };
        state
            .transactions
            .insert(transaction.id, transaction.clone());

        Ok(transaction)
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn latest_pending_deposit(
        &self,
        user_id: UserId,
        plan_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.kind == TransactionKind::Deposit
                    && tx.is_pending()
                    && tx.plan_id.as_deref() == Some(plan_id)
            })
            .max_by_key(|tx| tx.created_at)
            .cloned())
    }

    async fn pending_transactions(&self, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        let mut pending: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| tx.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at);
        pending.truncate(limit.max(0) as usize);

        Ok(pending)
    }

    async fn first_completed_deposit(
        &self,
        user_id: UserId,
    ) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.kind == TransactionKind::Deposit
                    && tx.status == TransactionStatus::Completed
            })
            .min_by_key(|tx| (tx.finalized_at, tx.created_at))
            .cloned())
    }

    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: Outcome,
    ) -> Result<Transaction, LedgerError> {
        let mut state = self.state.write().await;
        let LedgerState {
            users,
            transactions,
            ..
        } = &mut *state;

        let transaction = transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if !transaction.is_pending() {
            return Err(LedgerError::AlreadyFinalized(Box::new(transaction.clone())));
        }

        let user = users
            .get_mut(&transaction.user_id)
            .ok_or(LedgerError::UserNotFound(transaction.user_id))?;

        transaction.status = outcome.status();
        transaction.finalized_at = Some(Utc::now());

        if outcome == Outcome::Completed {
            user.balance += transaction.balance_delta();
            if transaction.kind == TransactionKind::Deposit {
                if let Some(plan_id) = &transaction.plan_id {
                    user.subscription_tier = Some(plan_id.clone());
                }
            }
        }

        Ok(transaction.clone())
    }

    async fn credit_commission(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        amount: Decimal,
    ) -> Result<ReferralEdge, LedgerError> {
        let mut state = self.state.write().await;
        if state.referral_edges.contains_key(&referred_id) {
            return Err(LedgerError::DuplicateReferral(referred_id));
        }
        if !state.users.contains_key(&referred_id) {
            return Err(LedgerError::UserNotFound(referred_id));
        }

        let now = Utc::now();
        let referrer = state
            .users
            .get_mut(&referrer_id)
            .ok_or(LedgerError::UserNotFound(referrer_id))?;
        referrer.balance += amount;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: referrer_id,
            kind: TransactionKind::Commission,
            amount,
            status: TransactionStatus::Completed,
            plan_id: None,
            wallet_address: None,
            created_at: now,
            finalized_at: Some(now),
        };
        let edge = ReferralEdge {
            referrer_id,
            referred_id,
            commission: amount,
            transaction_id: transaction.id,
            created_at: now,
        };

        state.transactions.insert(transaction.id, transaction);
        state.referral_edges.insert(referred_id, edge.clone());

        Ok(edge)
    }

    async fn referral_edge(&self, referred_id: UserId) -> Result<Option<ReferralEdge>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.referral_edges.get(&referred_id).cloned())
    }

    async fn referral_summary(&self, referrer_id: UserId) -> Result<ReferralSummary, LedgerError> {
        let state = self.state.read().await;
        let edges = state
            .referral_edges
            .values()
            .filter(|edge| edge.referrer_id == referrer_id);

        Ok(edges.fold(ReferralSummary::default(), |mut summary, edge| {
            summary.referrals += 1;
            summary.commission += edge.commission;
            summary
        }))
    }

    async fn record_approval_message(&self, approval: &ApprovalMessage) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        if !state.transactions.contains_key(&approval.transaction_id) {
            return Err(LedgerError::TransactionNotFound(approval.transaction_id));
        }
        state
            .approvals
            .insert(approval.transaction_id, approval.clone());

        Ok(())
    }

    async fn approval_message(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<ApprovalMessage>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.approvals.get(&transaction_id).cloned())
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<LedgerStats, LedgerError> {
        let state = self.state.read().await;
        let mut stats = LedgerStats::default();

        for user in state.users.values() {
            stats.total_users += 1;
            stats.total_balance += user.balance;
            if user.subscription_tier.is_some() {
                stats.subscribed_users += 1;
            }
            if user.registered_at >= since {
                stats.new_users += 1;
            }
        }

        for tx in state.transactions.values() {
            match (tx.kind, tx.status) {
                (TransactionKind::Deposit, TransactionStatus::Completed) => {
                    stats.completed_deposits += tx.amount
                }
                (TransactionKind::Withdrawal, TransactionStatus::Completed) => {
                    stats.completed_withdrawals += tx.amount
                }
                _ => {}
            }
            if tx.is_pending() {
                stats.pending_transactions += 1;
            }
            if tx.kind == TransactionKind::Deposit && tx.created_at >= since {
                stats.deposits_today += 1;
            }
        }

        for edge in state.referral_edges.values() {
            stats.referrals += 1;
            stats.commissions += edge.commission;
        }

        Ok(stats)
    }
}
