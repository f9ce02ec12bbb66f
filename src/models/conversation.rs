use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::users::UserId;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawKind {
    /// Fixed amount picked from the amount menu.
    Profits,
    /// Whole balance, taken when the wallet address arrives.
    Bonus,
}

/// The one input a user is expected to send next.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    None,
    AwaitingRegistration {
        referral_code: Option<String>,
    },
    AwaitingPaymentProof {
        plan_id: String,
    },
    AwaitingWalletAddress {
        kind: WithdrawKind,
        amount: Option<Decimal>,
    },
    AwaitingAdminReplyTarget {
        target_user_id: UserId,
    },
    AwaitingAdminFreeMessage {
        target_user_id: UserId,
    },
}

impl ConversationState {
    pub fn is_none(&self) -> bool {
        matches!(self, ConversationState::None)
    }
}
