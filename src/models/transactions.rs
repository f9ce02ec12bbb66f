use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::users::UserId;
use super::{ChatId, MessageId, ParseEnumError};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Commission,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Commission => "commission",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "commission" => Ok(TransactionKind::Commission),
            _ => Err(ParseEnumError {
                kind: "transaction kind",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "rejected" => Ok(TransactionStatus::Rejected),
            _ => Err(ParseEnumError {
                kind: "transaction status",
                value: s.to_string(),
            }),
        }
    }
}

/// Terminal decision an admin can take on a pending transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Rejected,
}

impl Outcome {
    pub fn status(&self) -> TransactionStatus {
        match self {
            Outcome::Completed => TransactionStatus::Completed,
            Outcome::Rejected => TransactionStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub plan_id: Option<String>,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Signed effect this transaction has on its owner's balance once completed.
    pub fn balance_delta(&self) -> Decimal {
        match self.kind {
            TransactionKind::Deposit | TransactionKind::Commission => self.amount,
            TransactionKind::Withdrawal => -self.amount,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub plan_id: Option<String>,
    pub wallet_address: Option<String>,
}

impl NewTransaction {
    pub fn deposit(user_id: UserId, amount: Decimal, plan_id: &str) -> Self {
        NewTransaction {
            user_id,
            kind: TransactionKind::Deposit,
            amount,
            plan_id: Some(plan_id.to_string()),
            wallet_address: None,
        }
    }

    pub fn withdrawal(user_id: UserId, amount: Decimal, wallet_address: &str) -> Self {
        NewTransaction {
            user_id,
            kind: TransactionKind::Withdrawal,
            amount,
            plan_id: None,
            wallet_address: Some(wallet_address.to_string()),
        }
    }
}

/// Admin-facing message a pending transaction was rendered into, so the card
/// can be updated once somebody decides.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ApprovalMessage {
    pub transaction_id: Uuid,
    pub chat_id: ChatId,
    pub message_id: MessageId,
}
