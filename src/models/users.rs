use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub phone: String,
    pub country: String,
    pub username: Option<String>,
    pub balance: Decimal,
    pub referral_code: String,
    pub referred_by: Option<UserId>,
    pub subscription_tier: Option<String>,
    pub wallet_address: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub is_active: bool,
}

impl User {
    pub fn referral_code_for(id: UserId) -> String {
        format!("REF{}", id)
    }
}

/// Profile fields a user supplies on registration. Re-registering only ever
/// touches these.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Profile {
    pub id: UserId,
    pub full_name: String,
    pub phone: String,
    pub country: String,
    pub username: Option<String>,
}

impl Profile {
    /// Reads the registration message: name, phone and country on the first
    /// three non-empty lines. Anything after that is ignored.
    pub fn parse(id: UserId, username: Option<String>, text: &str) -> Option<Self> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

        let full_name = lines.next()?.to_string();
        let phone = lines.next()?.to_string();
        let country = lines.next()?.to_string();

        Some(Profile {
            id,
            full_name,
            phone,
            country,
            username,
        })
    }
}
