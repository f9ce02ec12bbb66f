use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{LedgerError, LedgerStore};
use crate::models::referrals::{ReferralEdge, ReferralSummary};
use crate::models::reports::LedgerStats;
use crate::models::transactions::{
    ApprovalMessage, NewTransaction, Outcome, Transaction, TransactionKind, TransactionStatus,
};
use crate::models::users::{Profile, User, UserId};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    full_name: String,
    phone: String,
    country: String,
    username: Option<String>,
    balance: Decimal,
    referral_code: String,
    referred_by: Option<i64>,
    subscription_tier: Option<String>,
    wallet_address: Option<String>,
    registered_at: DateTime<Utc>,
    is_active: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            full_name: row.full_name,
            phone: row.phone,
            country: row.country,
            username: row.username,
            balance: row.balance,
            referral_code: row.referral_code,
            referred_by: row.referred_by,
            subscription_tier: row.subscription_tier,
            wallet_address: row.wallet_address,
            registered_at: row.registered_at,
            is_active: row.is_active,
        }
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: i64,
    kind: String,
    amount: Decimal,
    status: String,
    plan_id: Option<String>,
    wallet_address: Option<String>,
    created_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<TransactionKind>()
            .map_err(|e| LedgerError::Unavailable(format!("corrupt transaction {}: {}", row.id, e)))?;
        let status = row
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| LedgerError::Unavailable(format!("corrupt transaction {}: {}", row.id, e)))?;

        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            kind,
            amount: row.amount,
            status,
            plan_id: row.plan_id,
            wallet_address: row.wallet_address,
            created_at: row.created_at,
            finalized_at: row.finalized_at,
        })
    }
}

#[derive(FromRow)]
struct ReferralEdgeRow {
    referrer_id: i64,
    referred_id: i64,
    commission: Decimal,
    transaction_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ReferralEdgeRow> for ReferralEdge {
    fn from(row: ReferralEdgeRow) -> Self {
        ReferralEdge {
            referrer_id: row.referrer_id,
            referred_id: row.referred_id,
            commission: row.commission,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ApprovalRow {
    transaction_id: Uuid,
    chat_id: i64,
    message_id: i64,
}

#[derive(FromRow)]
struct StatsRow {
    total_users: i64,
    subscribed_users: i64,
    new_users: i64,
    total_balance: Decimal,
    completed_deposits: Decimal,
    completed_withdrawals: Decimal,
    referrals: i64,
    commissions: Decimal,
    pending_transactions: i64,
    deposits_today: i64,
}

const USER_COLUMNS: &str = "id, full_name, phone, country, username, balance, referral_code, \
     referred_by, subscription_tier, wallet_address, registered_at, is_active";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, status, plan_id, wallet_address, created_at, finalized_at";

#[derive(Clone)]
pub struct PgLedgerStore {
    conn: PgPool,
}

impl PgLedgerStore {
    pub fn new(conn: PgPool) -> Self {
        PgLedgerStore { conn }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_user(
        &self,
        profile: &Profile,
        referred_by: Option<UserId>,
    ) -> Result<User, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            r#"
                INSERT INTO users (id, full_name, phone, country, username, referral_code, referred_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.phone)
        .bind(&profile.country)
        .bind(&profile.username)
        .bind(User::referral_code_for(profile.id))
        .bind(referred_by)
        .fetch_optional(&self.conn)
        .await?;

        user.map(User::from)
            .ok_or(LedgerError::DuplicateUser(profile.id))
    }

    async fn update_profile(&self, profile: &Profile) -> Result<User, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            r#"
                UPDATE users
                SET full_name = $2, phone = $3, country = $4, username = $5
                WHERE id = $1
                RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.phone)
        .bind(&profile.country)
        .bind(&profile.username)
        .fetch_optional(&self.conn)
        .await?;

        user.map(User::from)
            .ok_or(LedgerError::UserNotFound(profile.id))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user.map(User::from))
    }

    async fn find_user_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE referral_code = $1",
            USER_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user.map(User::from))
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.conn)
        .await?;

        user.map(User::from).ok_or(LedgerError::UserNotFound(id))
    }

    async fn recent_users(&self, limit: i64) -> Result<Vec<User>, LedgerError> {
        let users = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY registered_at DESC LIMIT $1",
            USER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(users.into_iter().map(User::from).collect())
    }

    async fn raise_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let wallet_update = sqlx::query(
            "UPDATE users SET wallet_address = COALESCE($2, wallet_address) WHERE id = $1",
        )
        .bind(new.user_id)
        .bind(match new.kind {
            TransactionKind::Withdrawal => new.wallet_address.as_deref(),
            _ => None,
        })
        .execute(&mut *tx)
        .await?;

        if wallet_update.rows_affected() == 0 {
            return Err(LedgerError::UserNotFound(new.user_id));
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
                INSERT INTO transactions (id, user_id, kind, amount, status, plan_id, wallet_address)
                VALUES ($1, $2, $3, $4, 'pending', $5, $6)
                RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.amount)
        .bind(&new.plan_id)
        .bind(&new.wallet_address)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Transaction::try_from(row)
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn latest_pending_deposit(
        &self,
        user_id: UserId,
        plan_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
                SELECT {} FROM transactions
                WHERE user_id = $1 AND kind = 'deposit' AND status = 'pending' AND plan_id = $2
                ORDER BY created_at DESC
                LIMIT 1
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(plan_id)
        .fetch_optional(&self.conn)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn pending_transactions(&self, limit: i64) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE status = 'pending' ORDER BY created_at LIMIT $1",
            TRANSACTION_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn first_completed_deposit(
        &self,
        user_id: UserId,
    ) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
                SELECT {} FROM transactions
                WHERE user_id = $1 AND kind = 'deposit' AND status = 'completed'
                ORDER BY finalized_at ASC, created_at ASC
                LIMIT 1
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn finalize_transaction(
        &self,
        id: Uuid,
        outcome: Outcome,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.conn.begin().await?;

        // Row lock: a concurrent finalize waits here and then sees the new status.
        let current = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Transaction::try_from)
        .transpose()?
        .ok_or(LedgerError::TransactionNotFound(id))?;

        if !current.is_pending() {
            return Err(LedgerError::AlreadyFinalized(Box::new(current)));
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
                UPDATE transactions
                SET status = $2, finalized_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .bind(outcome.status().as_str())
        .fetch_one(&mut *tx)
        .await?;
        let finalized = Transaction::try_from(row)?;

        if outcome == Outcome::Completed {
            let tier = match finalized.kind {
                TransactionKind::Deposit => finalized.plan_id.as_deref(),
                _ => None,
            };
            sqlx::query(
                r#"
                    UPDATE users
                    SET balance = balance + $2,
                        subscription_tier = COALESCE($3, subscription_tier)
                    WHERE id = $1
                "#,
            )
            .bind(finalized.user_id)
            .bind(finalized.balance_delta())
            .bind(tier)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(finalized)
    }

    async fn credit_commission(
        &self,
        referrer_id: UserId,
        referred_id: UserId,
        amount: Decimal,
    ) -> Result<ReferralEdge, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let referrer = sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(referrer_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;
        if referrer.rows_affected() == 0 {
            return Err(LedgerError::UserNotFound(referrer_id));
        }

        let transaction_id: Uuid = sqlx::query_scalar(
            r#"
                INSERT INTO transactions (id, user_id, kind, amount, status, finalized_at)
                VALUES ($1, $2, 'commission', $3, 'completed', CURRENT_TIMESTAMP)
                RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(referrer_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        // The primary key on referred_id decides which caller wins. The loser
        // rolls back the balance change and the commission row with it.
        let edge = sqlx::query_as::<_, ReferralEdgeRow>(
            r#"
                INSERT INTO referral_edges (referred_id, referrer_id, commission, transaction_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (referred_id) DO NOTHING
                RETURNING referrer_id, referred_id, commission, transaction_id, created_at
            "#,
        )
        .bind(referred_id)
        .bind(referrer_id)
        .bind(amount)
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await?;

        match edge {
            Some(edge) => {
                tx.commit().await?;
                Ok(ReferralEdge::from(edge))
            }
            None => {
                tx.rollback().await?;
                Err(LedgerError::DuplicateReferral(referred_id))
            }
        }
    }

    async fn referral_edge(&self, referred_id: UserId) -> Result<Option<ReferralEdge>, LedgerError> {
        let row = sqlx::query_as::<_, ReferralEdgeRow>(
            "SELECT referrer_id, referred_id, commission, transaction_id, created_at FROM referral_edges WHERE referred_id = $1",
        )
        .bind(referred_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(row.map(ReferralEdge::from))
    }

    async fn referral_summary(&self, referrer_id: UserId) -> Result<ReferralSummary, LedgerError> {
        let (referrals, commission): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(1), COALESCE(SUM(commission), 0) FROM referral_edges WHERE referrer_id = $1",
        )
        .bind(referrer_id)
        .fetch_one(&self.conn)
        .await?;

        Ok(ReferralSummary {
            referrals,
            commission,
        })
    }

    async fn record_approval_message(&self, approval: &ApprovalMessage) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
                INSERT INTO approval_messages (transaction_id, chat_id, message_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (transaction_id)
                DO UPDATE SET chat_id = EXCLUDED.chat_id, message_id = EXCLUDED.message_id
            "#,
        )
        .bind(approval.transaction_id)
        .bind(approval.chat_id)
        .bind(approval.message_id)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    async fn approval_message(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<ApprovalMessage>, LedgerError> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT transaction_id, chat_id, message_id FROM approval_messages WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(row.map(|row| ApprovalMessage {
            transaction_id: row.transaction_id,
            chat_id: row.chat_id,
            message_id: row.message_id,
        }))
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<LedgerStats, LedgerError> {
        // One statement, one snapshot.
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
                SELECT
                    (SELECT COUNT(1) FROM users) AS total_users,
                    (SELECT COUNT(1) FROM users WHERE subscription_tier IS NOT NULL) AS subscribed_users,
                    (SELECT COUNT(1) FROM users WHERE registered_at >= $1) AS new_users,
                    (SELECT COALESCE(SUM(balance), 0) FROM users) AS total_balance,
                    (SELECT COALESCE(SUM(amount), 0) FROM transactions
                        WHERE kind = 'deposit' AND status = 'completed') AS completed_deposits,
                    (SELECT COALESCE(SUM(amount), 0) FROM transactions
                        WHERE kind = 'withdrawal' AND status = 'completed') AS completed_withdrawals,
                    (SELECT COUNT(1) FROM referral_edges) AS referrals,
                    (SELECT COALESCE(SUM(commission), 0) FROM referral_edges) AS commissions,
                    (SELECT COUNT(1) FROM transactions WHERE status = 'pending') AS pending_transactions,
                    (SELECT COUNT(1) FROM transactions
                        WHERE kind = 'deposit' AND created_at >= $1) AS deposits_today
            "#,
        )
        .bind(since)
        .fetch_one(&self.conn)
        .await?;

        Ok(LedgerStats {
            total_users: row.total_users,
            subscribed_users: row.subscribed_users,
            new_users: row.new_users,
            total_balance: row.total_balance,
            completed_deposits: row.completed_deposits,
            completed_withdrawals: row.completed_withdrawals,
            referrals: row.referrals,
            commissions: row.commissions,
            pending_transactions: row.pending_transactions,
            deposits_today: row.deposits_today,
        })
    }
}
