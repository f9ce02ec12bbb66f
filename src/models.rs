pub mod conversation;
pub mod plans;
pub mod referrals;
pub mod reports;
pub mod transactions;
pub mod users;

/// Chat identifier on the messaging transport. Private chats share the user id.
pub type ChatId = i64;
pub type MessageId = i64;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
