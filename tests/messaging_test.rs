mod common;

use common::*;
use ledger_bot::models::conversation::ConversationState;
use ledger_bot::services::scheduler::ReportKind;
use ledger_bot::services::workflow::texts;
use ledger_bot::services::ServiceError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_free_text_is_forwarded_with_reply_button() {
    let harness = Harness::new();
    harness.register(5, None).await;

    harness.text(5, "Where is my payout?").await.unwrap();

    let forwarded = harness.sent_to(ADMIN_CHANNEL).pop().unwrap();
    let body = forwarded.body().unwrap();
    assert!(body.contains("New message from"));
    assert!(body.contains("Where is my payout?"));
    let actions: Vec<_> = forwarded.keyboard().unwrap().actions().collect();
    assert_eq!(actions, vec!["reply:5"]);
    assert_eq!(harness.last_text_to(5), texts::message_forwarded());
}

#[tokio::test]
async fn test_admin_reply_reaches_user() {
    let harness = Harness::new();
    harness.register(5, None).await;
    harness.text(5, "Hello?").await.unwrap();

    harness.admin_press("reply:5").await.unwrap();
    assert_eq!(
        harness.state(ADMIN).await,
        ConversationState::AwaitingAdminFreeMessage { target_user_id: 5 }
    );
    assert_eq!(
        harness.last_text_to(ADMIN_CHANNEL),
        texts::admin_reply_prompt(5)
    );

    harness.text(ADMIN, "Your payout is on its way.").await.unwrap();

    assert!(harness.state(ADMIN).await.is_none());
    assert_eq!(
        harness.last_text_to(5),
        texts::admin_message("Your payout is on its way.")
    );
    assert_eq!(harness.last_text_to(ADMIN), texts::admin_message_sent(5));
}

#[tokio::test]
async fn test_message_user_button_starts_direct_message() {
    let harness = Harness::new();
    harness.register(5, None).await;

    harness.press(ADMIN, "message_user:5").await.unwrap();
    assert_eq!(
        harness.state(ADMIN).await,
        ConversationState::AwaitingAdminReplyTarget { target_user_id: 5 }
    );

    harness.text(ADMIN, "Welcome aboard").await.unwrap();

    assert_eq!(harness.last_text_to(5), texts::admin_message("Welcome aboard"));
    assert!(harness.state(ADMIN).await.is_none());
}

#[tokio::test]
async fn test_undeliverable_admin_message_is_reported() {
    let harness = Harness::new();
    harness.register(5, None).await;
    harness.transport.make_unreachable(5);

    harness.press(ADMIN, "reply:5").await.unwrap();
    harness.text(ADMIN, "Are you there?").await.unwrap();

    assert!(harness.state(ADMIN).await.is_none());
    assert_eq!(harness.last_text_to(ADMIN), texts::admin_message_failed(5));
    assert!(harness
        .texts_to(ADMIN_CHANNEL)
        .iter()
        .any(|text| text.contains("chat not found")));
}

#[tokio::test]
async fn test_non_admin_cannot_reply() {
    let harness = Harness::new();
    harness.register(5, None).await;
    harness.register(6, None).await;

    let result = harness.press(6, "reply:5").await;

    assert!(matches!(result, Err(ServiceError::Unauthorized(6))));
    assert!(harness.state(6).await.is_none());
}

#[tokio::test]
async fn test_admin_free_text_gets_hint() {
    let harness = Harness::new();

    harness.text(ADMIN, "hello bot").await.unwrap();

    assert_eq!(harness.last_text_to(ADMIN), texts::admin_hint());
    assert!(harness.texts_to(ADMIN_CHANNEL).is_empty());
}

#[tokio::test]
async fn test_admin_commands_are_restricted() {
    let harness = Harness::new();
    harness.register(5, None).await;

    let result = harness.text(5, "/stats").await;

    assert!(matches!(result, Err(ServiceError::Unauthorized(5))));
    assert_eq!(harness.last_text_to(5), texts::ADMINS_ONLY);
}

#[tokio::test]
async fn test_admin_stats_and_pending() {
    let harness = Harness::new();
    harness.register(1, None).await;
    harness.register(2, None).await;
    harness.fund(1, dec!(40)).await;
    let tx = harness.buy_plan(2, "basic").await;

    harness.text(ADMIN, "/stats").await.unwrap();
    let stats = harness.last_text_to(ADMIN);
    assert!(stats.contains("Users: 2"));
    assert!(stats.contains("Pending requests: 1"));

    harness.text(ADMIN, "/pending").await.unwrap();
    let listing = harness.sent_to(ADMIN);
    let actions: Vec<String> = listing
        .iter()
        .filter_map(|sent| sent.keyboard())
        .flat_map(|keyboard| keyboard.actions().map(str::to_string).collect::<Vec<_>>())
        .collect();
    assert!(actions.contains(&format!("approve_tx:{}", tx.id)));

    harness.text(ADMIN, "/users").await.unwrap();
    assert!(harness.last_text_to(ADMIN).contains("Recent users"));
}

#[tokio::test]
async fn test_admin_wallets_shows_payment_wallet() {
    let harness = Harness::new();

    harness.admin_press("admin_wallets").await.unwrap();

    let card = harness.sent_to(ADMIN_CHANNEL).pop().unwrap();
    let body = card.body().unwrap();
    assert!(body.contains("TPaymentWallet00000000000000000000"));
    assert!(body.contains("TRC20"));
    let actions: Vec<_> = card.keyboard().unwrap().actions().collect();
    assert!(actions.contains(&"admin_wallets"));
    assert!(actions.contains(&"admin_stats"));
}

#[tokio::test]
async fn test_non_admin_cannot_view_wallets() {
    let harness = Harness::new();
    harness.register(6, None).await;

    let result = harness.press(6, "admin_wallets").await;

    assert!(matches!(result, Err(ServiceError::Unauthorized(6))));
    assert!(!harness
        .texts_to(6)
        .iter()
        .any(|text| text.contains("TPaymentWallet")));
}

#[tokio::test]
async fn test_deactivated_user_is_turned_away() {
    let harness = Harness::new();
    harness.register(5, None).await;

    harness.text(ADMIN, "/deactivate 5").await.unwrap();
    assert!(!harness.user(5).await.is_active);
    assert!(harness.last_text_to(ADMIN).contains("deactivated"));

    harness.press(5, "balance").await.unwrap();
    assert_eq!(harness.last_text_to(5), texts::DEACTIVATED);
    assert_eq!(harness.answers().last().cloned(), Some(None));

    harness.text(ADMIN, "/activate 5").await.unwrap();
    assert!(harness.user(5).await.is_active);
    harness.text(5, "/balance").await.unwrap();
    assert_ne!(harness.last_text_to(5), texts::DEACTIVATED);
}

#[tokio::test]
async fn test_deactivate_requires_numeric_id() {
    let harness = Harness::new();

    let result = harness.text(ADMIN, "/deactivate abc").await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(harness.last_text_to(ADMIN), texts::usage("deactivate"));
}

#[tokio::test]
async fn test_deactivate_unknown_user_is_not_found() {
    let harness = Harness::new();

    let result = harness.text(ADMIN, "/deactivate 404").await;

    assert!(matches!(result, Err(ServiceError::NotFound(_))));
    assert_eq!(harness.last_text_to(ADMIN), texts::REQUEST_UNAVAILABLE);
}

#[tokio::test]
async fn test_ping_and_unknown_command() {
    let harness = Harness::new();

    harness.text(3, "/ping").await.unwrap();
    assert_eq!(harness.last_text_to(3), texts::PONG);

    harness.text(3, "/launch").await.unwrap();
    assert_eq!(harness.last_text_to(3), texts::unknown_command());
}

#[tokio::test]
async fn test_daily_report_goes_to_admin_channel() {
    let harness = Harness::new();
    harness.register(1, None).await;
    harness.fund(1, dec!(25)).await;

    harness.engine.emit_report(ReportKind::Daily).await.unwrap();

    let report = harness.last_text_to(ADMIN_CHANNEL);
    assert!(report.contains("Daily report"));
    assert!(report.contains("Users: 1"));
    assert!(report.contains("Completed deposits: 25 USDT"));
}
