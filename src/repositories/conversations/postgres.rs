use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use super::{ConversationError, ConversationStore, Expiry};
use crate::models::conversation::ConversationState;
use crate::models::users::UserId;

/// Conversation slots persisted as JSONB so a restart does not strand users
/// halfway through a flow.
#[derive(Clone)]
pub struct PgConversationStore {
    conn: PgPool,
    expiry: Expiry,
}

impl PgConversationStore {
    pub fn new(conn: PgPool, expiry: Expiry) -> Self {
        Self { conn, expiry }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn get(&self, user_id: UserId) -> Result<ConversationState, ConversationError> {
        let row: Option<(Json<ConversationState>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT state, updated_at FROM conversation_states WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        let state = match row {
            Some((Json(state), updated_at)) if !self.expiry.is_expired(updated_at, Utc::now()) => {
                state
            }
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
            return self.clear(user_id).await;
        }

        sqlx::query(
            r#"
                INSERT INTO conversation_states (user_id, state, updated_at)
                VALUES ($1, $2, CURRENT_TIMESTAMP)
                ON CONFLICT (user_id)
                DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(Json(&state))
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), ConversationError> {
        sqlx::query("DELETE FROM conversation_states WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(())
    }
}
