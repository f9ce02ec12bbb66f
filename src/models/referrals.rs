use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::users::UserId;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ReferralEdge {
    pub referrer_id: UserId,
    pub referred_id: UserId,
    pub commission: Decimal,
    pub transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ReferralSummary {
    pub referrals: i64,
    pub commission: Decimal,
}
