use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{ConversationError, ConversationStore, Expiry};
use crate::models::conversation::ConversationState;
use crate::models::users::UserId;

/// Conversation slots in a sharded map. Lost on restart.
#[derive(Default, Clone)]
pub struct MemoryConversationStore {
    slots: Arc<DashMap<UserId, (ConversationState, DateTime<Utc>)>>,
    expiry: Expiry,
}

impl MemoryConversationStore {
    pub fn new(expiry: Expiry) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            expiry,
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, user_id: UserId) -> Result<ConversationState, ConversationError> {
        let state = match self.slots.get(&user_id) {
            Some(entry) if !self.expiry.is_expired(entry.1, Utc::now()) => entry.0.clone(),
            _ => ConversationState::None,
        };

        Ok(state)
    }

    async fn set(
        &self,
        user_id: UserId,
        state: ConversationState,
    ) -> Result<(), ConversationError> {
        if state.is_none() {
            self.slots.remove(&user_id);
        } else {
            self.slots.insert(user_id, (state, Utc::now()));
        }

        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), ConversationError> {
        self.slots.remove(&user_id);
        Ok(())
    }
}
