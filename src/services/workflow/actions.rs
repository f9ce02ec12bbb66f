use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::users::UserId;
use crate::models::ParseEnumError;

/// Button payloads. Rendered into `Button::action` and parsed back on press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    MainMenu,
    Plans,
    Balance,
    Referral,
    Withdraw,
    WithdrawProfits,
    WithdrawBonus,
    Subscribe(String),
    ConfirmPayment(String),
    WithdrawAmount(Decimal),
    ApproveTx(Uuid),
    RejectTx(Uuid),
    ApproveWd(Uuid),
    RejectWd(Uuid),
    Reply(UserId),
    MessageUser(UserId),
    AdminStats,
    AdminUsers,
    AdminPending,
    AdminWallets,
}

impl Action {
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Action::ApproveTx(_)
                | Action::RejectTx(_)
                | Action::ApproveWd(_)
                | Action::RejectWd(_)
                | Action::Reply(_)
                | Action::MessageUser(_)
                | Action::AdminStats
                | Action::AdminUsers
                | Action::AdminPending
                | Action::AdminWallets
        )
    }

    /// Transaction an admin decision acts on.
    pub fn decision_target(&self) -> Option<Uuid> {
        match self {
            Action::ApproveTx(id)
            | Action::RejectTx(id)
            | Action::ApproveWd(id)
            | Action::RejectWd(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::MainMenu => f.write_str("main_menu"),
            Action::Plans => f.write_str("plans"),
            Action::Balance => f.write_str("balance"),
            Action::Referral => f.write_str("referral"),
            Action::Withdraw => f.write_str("withdraw"),
            Action::WithdrawProfits => f.write_str("withdraw_profits"),
            Action::WithdrawBonus => f.write_str("withdraw_bonus"),
            Action::Subscribe(plan) => write!(f, "subscribe:{}", plan),
            Action::ConfirmPayment(plan) => write!(f, "confirm_payment:{}", plan),
            Action::WithdrawAmount(amount) => write!(f, "withdraw_amount:{}", amount),
            Action::ApproveTx(id) => write!(f, "approve_tx:{}", id),
            Action::RejectTx(id) => write!(f, "reject_tx:{}", id),
            Action::ApproveWd(id) => write!(f, "approve_wd:{}", id),
            Action::RejectWd(id) => write!(f, "reject_wd:{}", id),
            Action::Reply(user) => write!(f, "reply:{}", user),
            Action::MessageUser(user) => write!(f, "message_user:{}", user),
            Action::AdminStats => f.write_str("admin_stats"),
            Action::AdminUsers => f.write_str("admin_users"),
            Action::AdminPending => f.write_str("admin_pending"),
            Action::AdminWallets => f.write_str("admin_wallets"),
        }
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEnumError {
            kind: "action",
            value: s.to_string(),
        };

        let action = match s.split_once(':') {
            None => match s {
                "main_menu" => Action::MainMenu,
                "plans" => Action::Plans,
                "balance" => Action::Balance,
                "referral" => Action::Referral,
                "withdraw" => Action::Withdraw,
                "withdraw_profits" => Action::WithdrawProfits,
                "withdraw_bonus" => Action::WithdrawBonus,
                "admin_stats" => Action::AdminStats,
                "admin_users" => Action::AdminUsers,
                "admin_pending" => Action::AdminPending,
                "admin_wallets" => Action::AdminWallets,
                _ => return Err(invalid()),
            },
            Some((_, "")) => return Err(invalid()),
            Some((name, arg)) => match name {
                "subscribe" => Action::Subscribe(arg.to_string()),
                "confirm_payment" => Action::ConfirmPayment(arg.to_string()),
                "withdraw_amount" => {
                    Action::WithdrawAmount(arg.parse().map_err(|_| invalid())?)
                }
                "approve_tx" => Action::ApproveTx(arg.parse().map_err(|_| invalid())?),
                "reject_tx" => Action::RejectTx(arg.parse().map_err(|_| invalid())?),
                "approve_wd" => Action::ApproveWd(arg.parse().map_err(|_| invalid())?),
                "reject_wd" => Action::RejectWd(arg.parse().map_err(|_| invalid())?),
                "reply" => Action::Reply(arg.parse().map_err(|_| invalid())?),
                "message_user" => Action::MessageUser(arg.parse().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            },
        };

        Ok(action)
    }
}
