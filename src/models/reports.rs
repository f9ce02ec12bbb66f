use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregates read in one snapshot for admin reports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct LedgerStats {
    pub total_users: i64,
    pub subscribed_users: i64,
    pub new_users: i64,
    pub total_balance: Decimal,
    pub completed_deposits: Decimal,
    pub completed_withdrawals: Decimal,
    pub referrals: i64,
    pub commissions: Decimal,
    pub pending_transactions: i64,
    pub deposits_today: i64,
}
