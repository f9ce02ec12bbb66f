use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::models::conversation::ConversationState;
use crate::models::users::UserId;

mod memory;
mod postgres;

pub use memory::MemoryConversationStore;
pub use postgres::PgConversationStore;

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for ConversationError {
    fn from(e: sqlx::Error) -> Self {
        ConversationError::Unavailable(e.to_string())
    }
}

/// One slot per user holding the input the engine expects next.
///
/// Missing and expired entries read as `ConversationState::None`. Writes are
/// last-writer-wins per key; different keys never contend.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<ConversationState, ConversationError>;
    async fn set(&self, user_id: UserId, state: ConversationState)
        -> Result<(), ConversationError>;
    async fn clear(&self, user_id: UserId) -> Result<(), ConversationError>;
}

pub type ConversationStoreRef = Arc<dyn ConversationStore>;

/// How long a prompt stays answerable. `None` keeps it until replaced.
#[derive(Clone, Copy, Debug, Default)]
pub struct Expiry(Option<TimeDelta>);

impl Expiry {
    pub fn from_secs(ttl_secs: u64) -> Self {
        match ttl_secs {
            0 => Expiry(None),
            secs => Expiry(TimeDelta::try_seconds(secs as i64)),
        }
    }

    pub fn after(ttl: TimeDelta) -> Self {
        Expiry(Some(ttl))
    }

    pub fn is_expired(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.0 {
            Some(ttl) => now - updated_at > ttl,
            None => false,
        }
    }
}
