use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::plans::Plan;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_listen")]
    pub listen: String,
    pub bot_username: String,
}

#[derive(Debug, Deserialize)]
pub struct Channels {
    pub archive: i64,
    pub admin: i64,
}

#[derive(Debug, Deserialize)]
pub struct Payments {
    pub wallet_address: String,
    #[serde(default = "default_network")]
    pub network: String,
}

#[derive(Debug, Deserialize)]
pub struct Admins {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Referrals {
    pub commission_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct Withdrawals {
    pub minimum: Decimal,
    pub amount_options: Vec<Decimal>,
    pub wallet_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Notifications {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Scheduler {
    pub daily_report_hour: u32,
}

#[derive(Debug, Deserialize)]
pub struct Conversation {
    /// Seconds after which an unanswered prompt is forgotten. 0 keeps it forever.
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub telegram: Telegram,
    pub channels: Channels,
    pub payments: Payments,
    pub admins: Admins,
    pub referrals: Referrals,
    pub withdrawals: Withdrawals,
    pub notifications: Notifications,
    pub scheduler: Scheduler,
    pub conversation: Conversation,
    pub plans: Vec<Plan>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_network() -> String {
    "TRC20".to_string()
}

impl Settings {
    /// Loads `path` (optional) and then `APP__SECTION__KEY` environment
    /// overrides on top of the built-in defaults.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("referrals.commission_percent", 10)?
            .set_default("withdrawals.minimum", 25)?
            .set_default("withdrawals.amount_options", vec![25, 50, 100, 250, 500, 1000])?
            .set_default("withdrawals.wallet_prefixes", vec!["T", "0x", "1", "3", "bc1"])?
            .set_default("notifications.max_attempts", 3)?
            .set_default("notifications.backoff_ms", 500)?
            .set_default("scheduler.daily_report_hour", 8)?
            .set_default("conversation.ttl_secs", 0)?
            .set_default("admins.user_ids", Vec::<i64>::new())?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admins.user_ids")
                    .with_list_parse_key("withdrawals.amount_options")
                    .with_list_parse_key("withdrawals.wallet_prefixes")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plans.is_empty() {
            return Err(ConfigError::Message("at least one plan is required".into()));
        }
        if self.referrals.commission_percent < Decimal::ZERO
            || self.referrals.commission_percent > Decimal::ONE_HUNDRED
        {
            return Err(ConfigError::Message(
                "referrals.commission_percent must be within 0..=100".into(),
            ));
        }
        if self.withdrawals.minimum <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "withdrawals.minimum must be positive".into(),
            ));
        }
        if self.notifications.max_attempts == 0 {
            return Err(ConfigError::Message(
                "notifications.max_attempts must be at least 1".into(),
            ));
        }
        if self.scheduler.daily_report_hour > 23 {
            return Err(ConfigError::Message(
                "scheduler.daily_report_hour must be within 0..=23".into(),
            ));
        }

        Ok(())
    }
}
