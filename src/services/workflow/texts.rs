//! User- and admin-facing message bodies and keyboards.

use rust_decimal::Decimal;

use super::actions::Action;
use crate::models::plans::Plan;
use crate::models::referrals::ReferralSummary;
use crate::models::reports::LedgerStats;
use crate::models::transactions::{Outcome, Transaction, TransactionKind, TransactionStatus};
use crate::models::users::{User, UserId};
use crate::transport::{Button, Keyboard, Sender};

pub const GENERIC_FAILURE: &str = "❌ Something went wrong. Please try again in a moment.";
pub const NOT_ALLOWED: &str = "⛔ Not allowed.";
pub const ADMINS_ONLY: &str = "⛔ This command is for admins only.";
pub const NOT_REGISTERED: &str = "Please register first with /start.";
pub const DEACTIVATED: &str =
    "🚫 Your account has been deactivated. Please contact support for details.";
pub const REQUEST_UNAVAILABLE: &str = "❌ That request is no longer available.";
pub const PONG: &str = "✅ The bot is running normally.";

pub fn usdt(amount: Decimal) -> String {
    format!("{} USDT", amount.normalize())
}

pub fn display_name(sender: &Sender) -> String {
    match &sender.username {
        Some(username) => format!("{} (@{})", sender.first_name, username),
        None => sender.first_name.clone(),
    }
}

pub fn main_menu() -> Keyboard {
    Keyboard::new()
        .button("📈 Investment plans", Action::Plans)
        .row(vec![
            Button::new("💰 Balance", Action::Balance),
            Button::new("👥 Referrals", Action::Referral),
        ])
        .button("💸 Withdraw", Action::Withdraw)
}

pub fn back_to_menu() -> Keyboard {
    Keyboard::new().button("⬅️ Main menu", Action::MainMenu)
}

pub fn admin_panel() -> Keyboard {
    Keyboard::new()
        .button("📊 Statistics", Action::AdminStats)
        .button("👤 Recent users", Action::AdminUsers)
        .button("⏳ Pending requests", Action::AdminPending)
        .button("💼 Payment wallet", Action::AdminWallets)
}

pub fn welcome_back(user: &User) -> String {
    format!("👋 Welcome back, {}!\n\nChoose an option:", user.full_name)
}

pub fn registration_prompt(first_name: &str) -> String {
    format!(
        "👋 Welcome, {}!\n\nTo register, send your details in one message, one per line:\n\n{}",
        first_name,
        registration_example()
    )
}

pub fn registration_retry() -> String {
    format!(
        "⚠️ Please send all three details, each on its own line:\n\n{}",
        registration_example()
    )
}

fn registration_example() -> &'static str {
    "Full name\nPhone number\nCountry\n\nExample:\nJohn Smith\n+1 555 0100\nCanada"
}

pub fn registration_complete(user: &User) -> String {
    format!(
        "✅ Registration complete, {}!\n\nYour referral code: {}\n\nChoose an option:",
        user.full_name, user.referral_code
    )
}

pub fn admin_new_visitor(sender: &Sender, referral_code: Option<&str>) -> String {
    format!(
        "👤 New visitor: {}\nID: {}\nReferral code: {}",
        display_name(sender),
        sender.id,
        referral_code.unwrap_or("none")
    )
}

pub fn admin_registration(user: &User, created: bool, referrer: Option<&User>) -> String {
    let mut text = format!(
        "📝 {}\n\nName: {}\nPhone: {}\nCountry: {}\nID: {}",
        if created {
            "New registration"
        } else {
            "Profile updated"
        },
        user.full_name,
        user.phone,
        user.country,
        user.id
    );
    if let Some(referrer) = referrer {
        text.push_str(&format!(
            "\nReferred by: {} ({})",
            referrer.full_name, referrer.id
        ));
    }
    text
}

pub fn new_referral(referred: &User) -> String {
    format!(
        "🎉 {} just registered with your referral code. You earn a commission on their first deposit.",
        referred.full_name
    )
}

pub fn plan_catalog(plans: &[Plan]) -> (String, Keyboard) {
    let mut text = String::from("📈 Investment plans\n");
    let mut keyboard = Keyboard::new();

    for plan in plans {
        text.push_str(&format!(
            "\n• {}: {} for {} days, returns {}",
            plan.name,
            usdt(plan.price),
            plan.days,
            plan.returns
        ));
        keyboard = keyboard.button(
            format!("{} ({})", plan.name, usdt(plan.price)),
            Action::Subscribe(plan.id.clone()),
        );
    }

    (text, keyboard.button("⬅️ Main menu", Action::MainMenu))
}

pub fn payment_instructions(plan: &Plan, wallet: &str, network: &str) -> (String, Keyboard) {
    let text = format!(
        "💳 Plan {}\n\nSend exactly {} ({}) to:\n\n{}\n\nThen tap the button below and send a screenshot of the payment.",
        plan.name,
        usdt(plan.price),
        network,
        wallet
    );
    let keyboard = Keyboard::new()
        .button("✅ I have paid", Action::ConfirmPayment(plan.id.clone()))
        .button("⬅️ Main menu", Action::MainMenu);

    (text, keyboard)
}

pub fn admin_plan_selected(user: &User, plan: &Plan, tx: &Transaction) -> String {
    format!(
        "🧾 {} ({}) selected plan {} for {}\nTransaction: {}",
        user.full_name,
        user.id,
        plan.name,
        usdt(tx.amount),
        tx.id
    )
}

pub fn proof_prompt(plan: &Plan) -> String {
    format!(
        "📸 Send a screenshot of your {} payment for the {} plan.",
        usdt(plan.price),
        plan.name
    )
}

pub fn proof_received() -> &'static str {
    "✅ Payment proof received. You will be notified once it has been reviewed."
}

pub fn proof_not_forwarded() -> &'static str {
    "⚠️ We could not forward your payment proof. Please send the image again."
}

pub fn deposit_card(user: &User, plan: &Plan, tx: &Transaction) -> (String, Keyboard) {
    let text = format!(
        "💳 Payment proof\n\nUser: {} ({})\nPlan: {}\nAmount: {}\nTransaction: {}",
        user.full_name,
        user.id,
        plan.name,
        usdt(tx.amount),
        tx.id
    );
    let keyboard = Keyboard::new()
        .row(vec![
            Button::new("✅ Approve", Action::ApproveTx(tx.id)),
            Button::new("❌ Reject", Action::RejectTx(tx.id)),
        ])
        .button("💬 Reply", Action::Reply(user.id));

    (text, keyboard)
}

pub fn withdrawal_card(user: &User, tx: &Transaction) -> (String, Keyboard) {
    let text = format!(
        "🔄 Withdrawal request\n\nUser: {} ({})\nAmount: {}\nWallet: {}\nBalance: {}\nTransaction: {}",
        user.full_name,
        user.id,
        usdt(tx.amount),
        tx.wallet_address.as_deref().unwrap_or("-"),
        usdt(user.balance),
        tx.id
    );
    let keyboard = Keyboard::new()
        .row(vec![
            Button::new("✅ Approve", Action::ApproveWd(tx.id)),
            Button::new("❌ Reject", Action::RejectWd(tx.id)),
        ])
        .button("💬 Message user", Action::MessageUser(user.id));

    (text, keyboard)
}

pub fn decided_card(tx: &Transaction, outcome: Outcome, admin: &Sender) -> String {
    let verdict = match outcome {
        Outcome::Completed => "✅ Approved",
        Outcome::Rejected => "❌ Rejected",
    };
    format!(
        "{} by {}\n\n{} of {} for user {}\nTransaction: {}",
        verdict,
        display_name(admin),
        tx.kind,
        usdt(tx.amount),
        tx.user_id,
        tx.id
    )
}

pub fn decision_for_user(tx: &Transaction, plan: Option<&Plan>) -> String {
    match (tx.kind, tx.status) {
        (TransactionKind::Deposit, TransactionStatus::Completed) => format!(
            "🎉 Your subscription is confirmed!\n\nPlan: {}\nAmount: {}",
            plan.map(|plan| plan.name.as_str()).unwrap_or("-"),
            usdt(tx.amount)
        ),
        (TransactionKind::Deposit, _) => format!(
            "❌ Your payment of {} could not be confirmed. Contact support if you think this is a mistake.",
            usdt(tx.amount)
        ),
        (TransactionKind::Withdrawal, TransactionStatus::Completed) => format!(
            "✅ Your withdrawal of {} has been sent to {}.",
            usdt(tx.amount),
            tx.wallet_address.as_deref().unwrap_or("your wallet")
        ),
        (TransactionKind::Withdrawal, _) => format!(
            "❌ Your withdrawal request of {} was rejected. Your balance is unchanged.",
            usdt(tx.amount)
        ),
        (TransactionKind::Commission, _) => format!("💰 Commission of {}.", usdt(tx.amount)),
    }
}

pub fn already_handled(tx: &Transaction) -> String {
    format!("Already handled: {}", tx.status)
}

pub fn archive_entry(tx: &Transaction, admin: &Sender) -> String {
    format!(
        "🗂 {} {} {} for user {} by {} ({})",
        tx.kind,
        tx.status,
        usdt(tx.amount),
        tx.user_id,
        display_name(admin),
        tx.id
    )
}

pub fn commission_earned(amount: Decimal, referred: &User) -> String {
    format!(
        "💰 You earned {} commission from {}'s first deposit.",
        usdt(amount),
        referred.full_name
    )
}

pub fn balance(user: &User) -> String {
    format!(
        "💰 Balance: {}\nPlan: {}\nWallet: {}",
        usdt(user.balance),
        user.subscription_tier.as_deref().unwrap_or("none"),
        user.wallet_address.as_deref().unwrap_or("not set")
    )
}

pub fn referral(user: &User, summary: &ReferralSummary, bot_username: &str) -> String {
    format!(
        "👥 Referral program\n\nYour code: {code}\nLink: https://t.me/{bot}?start={code}\n\nReferrals: {}\nCommission earned: {}",
        summary.referrals,
        usdt(summary.commission),
        code = user.referral_code,
        bot = bot_username,
    )
}

pub fn withdraw_menu(user: &User) -> (String, Keyboard) {
    let text = format!(
        "💸 Withdraw\n\nAvailable balance: {}\n\nWhat would you like to withdraw?",
        usdt(user.balance)
    );
    let keyboard = Keyboard::new()
        .button("📈 Profits", Action::WithdrawProfits)
        .button("🎁 Bonus (full balance)", Action::WithdrawBonus)
        .button("⬅️ Main menu", Action::MainMenu);

    (text, keyboard)
}

pub fn amount_picker(options: &[Decimal], minimum: Decimal) -> (String, Keyboard) {
    let text = format!(
        "Choose the amount to withdraw (minimum {}):",
        usdt(minimum)
    );
    let keyboard = options
        .chunks(3)
        .fold(Keyboard::new(), |keyboard, chunk| {
            keyboard.row(
                chunk
                    .iter()
                    .map(|amount| Button::new(usdt(*amount), Action::WithdrawAmount(*amount)))
                    .collect(),
            )
        })
        .button("⬅️ Main menu", Action::MainMenu);

    (text, keyboard)
}

pub fn below_minimum(minimum: Decimal) -> String {
    format!("⚠️ The minimum withdrawal is {}.", usdt(minimum))
}

pub fn insufficient_balance(balance: Decimal) -> String {
    format!(
        "⚠️ Insufficient balance. Available: {}.",
        usdt(balance)
    )
}

pub fn wallet_prompt(amount: Option<Decimal>) -> String {
    match amount {
        Some(amount) => format!(
            "Send the wallet address that should receive {}.",
            usdt(amount)
        ),
        None => "Send the wallet address that should receive your full balance.".to_string(),
    }
}

pub fn invalid_wallet(prefixes: &[String]) -> String {
    format!(
        "⚠️ That does not look like a wallet address. It must be at least 10 characters and start with one of: {}",
        prefixes.join(", ")
    )
}

pub fn approval_not_recorded(tx: &Transaction, error: &str) -> String {
    format!(
        "⚠️ The card for {} {} ({}) was posted but not recorded, so it will not close on its own. Use /pending to decide it.\n\n{}",
        tx.kind,
        usdt(tx.amount),
        tx.id,
        error
    )
}

pub fn withdrawal_submitted(tx: &Transaction) -> String {
    format!(
        "✅ Withdrawal request for {} submitted. You will be notified once it is processed.",
        usdt(tx.amount)
    )
}

pub fn forwarded_message(sender: &Sender, text: &str) -> String {
    format!(
        "📬 New message from {}\nID: {}\n\n{}",
        display_name(sender),
        sender.id,
        text
    )
}

pub fn reply_button(user_id: UserId) -> Keyboard {
    Keyboard::new().button("💬 Reply", Action::Reply(user_id))
}

pub fn message_forwarded() -> &'static str {
    "✉️ Your message has been forwarded to support."
}

pub fn admin_reply_prompt(user_id: UserId) -> String {
    format!("✍️ Send the message for user {}.", user_id)
}

pub fn admin_message(text: &str) -> String {
    format!("📩 Message from support:\n\n{}", text)
}

pub fn admin_message_sent(user_id: UserId) -> String {
    format!("✅ Message delivered to user {}.", user_id)
}

pub fn admin_message_failed(user_id: UserId) -> String {
    format!("❌ Could not deliver the message to user {}.", user_id)
}

pub fn admin_hint() -> &'static str {
    "ℹ️ Use /panel for the admin panel, or press Reply on a user message to answer it."
}

pub fn help(is_admin: bool) -> String {
    let mut text = String::from(
        "ℹ️ Commands\n\n/start - register or open the main menu\n/balance - show your balance\n/cancel - cancel the current step\n/ping - check the bot\n/help - this message",
    );
    if is_admin {
        text.push_str(
            "\n\nAdmin\n/panel - admin panel\n/stats - statistics\n/users - recent users\n/pending - pending requests\n/deactivate <id> - deactivate a user\n/activate <id> - reactivate a user",
        );
    }
    text
}

pub fn cancelled() -> &'static str {
    "Cancelled. Choose an option:"
}

pub fn unknown_command() -> &'static str {
    "Unknown command. Use /help to see what is available."
}

pub fn stats(stats: &LedgerStats) -> String {
    format!(
        "📊 Statistics\n\nUsers: {}\nSubscribed: {}\nNew today: {}\nTotal balance: {}\nCompleted deposits: {}\nCompleted withdrawals: {}\nReferrals: {}\nCommissions paid: {}\nPending requests: {}",
        stats.total_users,
        stats.subscribed_users,
        stats.new_users,
        usdt(stats.total_balance),
        usdt(stats.completed_deposits),
        usdt(stats.completed_withdrawals),
        stats.referrals,
        usdt(stats.commissions),
        stats.pending_transactions
    )
}

pub fn daily_report(stats: &LedgerStats) -> String {
    format!(
        "🗓 Daily report\n\nNew users today: {}\nDeposits raised today: {}\nUsers: {}\nTotal balance: {}\nCompleted deposits: {}\nCompleted withdrawals: {}\nPending requests: {}",
        stats.new_users,
        stats.deposits_today,
        stats.total_users,
        usdt(stats.total_balance),
        usdt(stats.completed_deposits),
        usdt(stats.completed_withdrawals),
        stats.pending_transactions
    )
}

pub fn hourly_report(stats: &LedgerStats) -> String {
    format!(
        "⏱ Hourly report\n\nPending requests: {}\nTotal balance: {}",
        stats.pending_transactions,
        usdt(stats.total_balance)
    )
}

pub fn payment_wallet(wallet: &str, network: &str) -> String {
    format!(
        "💼 Payment wallet\n\nActive address: {}\nNetwork: {}\n\nSubscribers are shown this address when they pick a plan.",
        wallet, network
    )
}

pub fn recent_users(users: &[User]) -> String {
    if users.is_empty() {
        return "No users yet.".to_string();
    }

    users.iter().fold(String::from("👤 Recent users\n"), |mut text, user| {
        text.push_str(&format!(
            "\n{} ({}) - {} - {}{}",
            user.full_name,
            user.id,
            usdt(user.balance),
            user.subscription_tier.as_deref().unwrap_or("no plan"),
            if user.is_active { "" } else { " - deactivated" }
        ));
        text
    })
}

pub fn pending(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No pending requests.".to_string();
    }

    transactions
        .iter()
        .fold(String::from("⏳ Pending requests\n"), |mut text, tx| {
            text.push_str(&format!(
                "\n{} {} from {} ({})",
                tx.kind,
                usdt(tx.amount),
                tx.user_id,
                tx.id
            ));
            text
        })
}

pub fn pending_keyboard(tx: &Transaction) -> Option<Keyboard> {
    let (approve, reject) = match tx.kind {
        TransactionKind::Deposit => (Action::ApproveTx(tx.id), Action::RejectTx(tx.id)),
        TransactionKind::Withdrawal => (Action::ApproveWd(tx.id), Action::RejectWd(tx.id)),
        TransactionKind::Commission => return None,
    };

    Some(Keyboard::new().row(vec![
        Button::new(format!("✅ {} {}", tx.kind, usdt(tx.amount)), approve),
        Button::new("❌", reject),
    ]))
}

pub fn account_status(user: &User) -> String {
    format!(
        "User {} ({}) is now {}.",
        user.full_name,
        user.id,
        if user.is_active { "active" } else { "deactivated" }
    )
}

pub fn usage(command: &str) -> String {
    format!("Usage: /{} <user id>", command)
}

pub fn failure_report(sender: &Sender, error: &str) -> String {
    format!(
        "🚨 Error while handling an event from {} ({}):\n\n{}",
        display_name(sender),
        sender.id,
        error
    )
}
