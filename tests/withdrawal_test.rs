mod common;

use common::*;
use ledger_bot::models::conversation::{ConversationState, WithdrawKind};
use ledger_bot::models::transactions::{Outcome, TransactionKind, TransactionStatus};
use ledger_bot::repositories::ledger::{LedgerError, LedgerStore};
use ledger_bot::services::workflow::texts;
use ledger_bot::services::ServiceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_withdrawal_reject_then_approve() {
    let harness = Harness::new();
    harness.register(3, None).await;
    harness.fund(3, dec!(150)).await;

    harness.press(3, "withdraw_amount:100").await.unwrap();
    assert_eq!(
        harness.state(3).await,
        ConversationState::AwaitingWalletAddress {
            kind: WithdrawKind::Profits,
            amount: Some(dec!(100)),
        }
    );

    harness.text(3, WALLET).await.unwrap();
    assert!(harness.state(3).await.is_none());

    let pending = harness.pending(3, TransactionKind::Withdrawal).await;
    assert_eq!(pending.len(), 1);
    let tx = pending[0].clone();
    assert_eq!(tx.amount, dec!(100));
    assert_eq!(tx.wallet_address.as_deref(), Some(WALLET));
    assert_eq!(harness.balance(3).await, dec!(150));
    assert_eq!(harness.user(3).await.wallet_address.as_deref(), Some(WALLET));
    assert!(harness
        .last_text_to(ADMIN_CHANNEL)
        .contains("Withdrawal request"));

    harness
        .admin_press(format!("reject_wd:{}", tx.id))
        .await
        .unwrap();
    let rejected = harness.ledger.find_transaction(tx.id).await.unwrap().unwrap();
    assert_eq!(rejected.status, TransactionStatus::Rejected);
    assert_eq!(harness.balance(3).await, dec!(150));
    assert!(harness.last_text_to(3).contains("rejected"));

    harness
        .admin_press(format!("approve_wd:{}", tx.id))
        .await
        .unwrap();
    assert_eq!(harness.balance(3).await, dec!(150));
    assert_eq!(
        harness.answers().last().cloned().flatten().as_deref(),
        Some("Already handled: rejected")
    );

    let again = harness
        .ledger
        .finalize_transaction(tx.id, Outcome::Completed)
        .await;
    assert!(matches!(again, Err(LedgerError::AlreadyFinalized(_))));
}

#[tokio::test]
async fn test_approved_withdrawal_debits_balance() {
    let harness = Harness::new();
    harness.register(3, None).await;
    harness.fund(3, dec!(150)).await;
    harness.press(3, "withdraw_amount:100").await.unwrap();
    harness.text(3, WALLET).await.unwrap();
    let tx = harness.pending(3, TransactionKind::Withdrawal).await.remove(0);

    harness
        .admin_press(format!("approve_wd:{}", tx.id))
        .await
        .unwrap();

    assert_eq!(harness.balance(3).await, dec!(50));
    assert!(harness.last_text_to(3).contains("has been sent"));
}

#[tokio::test]
async fn test_zero_balance_withdrawal_is_rejected() {
    let harness = Harness::new();
    harness.register(4, None).await;

    harness.press(4, "withdraw_amount:25").await.unwrap();
    assert!(harness.state(4).await.is_none());
    assert_eq!(
        harness.last_text_to(4),
        texts::insufficient_balance(Decimal::ZERO)
    );

    harness.press(4, "withdraw_bonus").await.unwrap();
    assert!(harness.state(4).await.is_none());

    assert!(harness.ledger.pending_transactions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_amount_below_minimum() {
    let harness = Harness::new();
    harness.register(4, None).await;
    harness.fund(4, dec!(100)).await;

    harness.press(4, "withdraw_amount:10").await.unwrap();

    assert!(harness.state(4).await.is_none());
    assert_eq!(harness.last_text_to(4), texts::below_minimum(dec!(25)));
}

#[tokio::test]
async fn test_invalid_wallet_is_reprompted() {
    let harness = Harness::new();
    harness.register(5, None).await;
    harness.fund(5, dec!(100)).await;
    harness.press(5, "withdraw_amount:50").await.unwrap();

    for address in ["Xabcdefghijklmnop", "T123", "T123 456 789 0"] {
        harness.text(5, address).await.unwrap();
        assert!(harness.last_text_to(5).contains("does not look like a wallet"));
    }

    assert!(matches!(
        harness.state(5).await,
        ConversationState::AwaitingWalletAddress { .. }
    ));
    assert!(harness.pending(5, TransactionKind::Withdrawal).await.is_empty());
}

#[tokio::test]
async fn test_bonus_withdraws_full_balance() {
    let harness = Harness::new();
    harness.register(6, None).await;
    harness.fund(6, dec!(40)).await;

    harness.press(6, "withdraw_bonus").await.unwrap();
    assert_eq!(
        harness.state(6).await,
        ConversationState::AwaitingWalletAddress {
            kind: WithdrawKind::Bonus,
            amount: None,
        }
    );
    harness.text(6, "0x1234567890abcdef").await.unwrap();

    let pending = harness.pending(6, TransactionKind::Withdrawal).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, dec!(40));
}

#[tokio::test]
async fn test_store_failure_leaves_wallet_state() {
    let harness = Harness::new();
    harness.register(7, None).await;
    harness.fund(7, dec!(100)).await;
    harness.press(7, "withdraw_amount:50").await.unwrap();
    harness.ledger.fail_writes(true);

    let result = harness.text(7, WALLET).await;

    assert!(matches!(result, Err(ServiceError::StoreUnavailable(_))));
    assert_eq!(
        harness.state(7).await,
        ConversationState::AwaitingWalletAddress {
            kind: WithdrawKind::Profits,
            amount: Some(dec!(50)),
        }
    );
    assert!(harness.pending(7, TransactionKind::Withdrawal).await.is_empty());
    assert_eq!(harness.last_text_to(7), texts::GENERIC_FAILURE);
    assert!(harness.last_text_to(ADMIN_CHANNEL).contains("Store unavailable"));

    harness.ledger.fail_writes(false);
    harness.text(7, WALLET).await.unwrap();
    assert_eq!(harness.pending(7, TransactionKind::Withdrawal).await.len(), 1);
}

#[tokio::test]
async fn test_unrecorded_withdrawal_card_still_confirms() {
    let harness = Harness::new();
    harness.register(7, None).await;
    harness.fund(7, dec!(100)).await;
    harness.press(7, "withdraw_amount:50").await.unwrap();
    harness.ledger.fail_approval_records(true);

    harness.text(7, WALLET).await.unwrap();

    assert!(harness.state(7).await.is_none());
    let pending = harness.pending(7, TransactionKind::Withdrawal).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(harness.last_text_to(7), texts::withdrawal_submitted(&pending[0]));
    assert_ne!(harness.last_text_to(7), texts::GENERIC_FAILURE);
    assert_eq!(
        harness.last_text_to(ADMIN_CHANNEL),
        texts::approval_not_recorded(&pending[0], "ledger store unavailable: connection reset")
    );
}

#[tokio::test]
async fn test_approval_refused_when_balance_dropped() {
    let harness = Harness::new();
    harness.register(8, None).await;
    harness.fund(8, dec!(100)).await;

    harness.press(8, "withdraw_amount:100").await.unwrap();
    harness.text(8, WALLET).await.unwrap();
    harness.press(8, "withdraw_amount:100").await.unwrap();
    harness.text(8, WALLET).await.unwrap();

    let pending = harness.pending(8, TransactionKind::Withdrawal).await;
    assert_eq!(pending.len(), 2);

    harness
        .admin_press(format!("approve_wd:{}", pending[0].id))
        .await
        .unwrap();
    harness
        .admin_press(format!("approve_wd:{}", pending[1].id))
        .await
        .unwrap();

    assert_eq!(harness.balance(8).await, Decimal::ZERO);
    let second = harness
        .ledger
        .find_transaction(pending[1].id)
        .await
        .unwrap()
        .unwrap();
    assert!(second.is_pending());
    assert!(harness
        .answers()
        .last()
        .cloned()
        .flatten()
        .unwrap_or_default()
        .contains("Reject this request instead"));
}

#[tokio::test]
async fn test_balance_matches_completed_ledger() {
    let harness = Harness::new();
    harness.register(1, None).await;
    harness.register(2, Some("REF1")).await;

    let deposit = harness.buy_plan(2, "vip").await;
    harness
        .admin_press(format!("approve_tx:{}", deposit.id))
        .await
        .unwrap();
    harness.press(2, "withdraw_amount:50").await.unwrap();
    harness.text(2, WALLET).await.unwrap();
    let withdrawal = harness.pending(2, TransactionKind::Withdrawal).await.remove(0);
    harness
        .admin_press(format!("approve_wd:{}", withdrawal.id))
        .await
        .unwrap();

    assert_eq!(harness.balance(2).await, dec!(50));
    assert_eq!(harness.balance(1).await, dec!(10));

    let stats = harness
        .ledger
        .stats(chrono::Utc::now() - chrono::TimeDelta::days(1))
        .await
        .unwrap();
    assert_eq!(
        stats.total_balance,
        stats.completed_deposits + stats.commissions - stats.completed_withdrawals
    );
}
