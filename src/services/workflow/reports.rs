use chrono::{DateTime, Local, TimeDelta, Utc};

use super::{texts, WorkflowEngine};
use crate::services::scheduler::ReportKind;
use crate::services::ServiceError;

/// Local midnight, as the lower bound for "today" counters.
pub(super) fn start_of_today() -> DateTime<Utc> {
    Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() - TimeDelta::hours(24))
}

impl WorkflowEngine {
    /// Read-only summary posted to the admin channel.
    pub async fn emit_report(&self, kind: ReportKind) -> Result<(), ServiceError> {
        let stats = self.ledger.stats(start_of_today()).await?;
        let text = match kind {
            ReportKind::Daily => texts::daily_report(&stats),
            ReportKind::Hourly => texts::hourly_report(&stats),
        };

        self.notifier
            .text(self.config.admin_channel, text, None)
            .await?;
        Ok(())
    }
}
