use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::workflow::WorkflowRequest;

pub const TICK: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    Hourly,
    Daily,
}

/// Reports that fell due between two ticks, in local wall-clock time.
///
/// Hourly fires whenever the clock hour changed. Daily fires when
/// `daily_hour:00` lies in `(last, now]`.
pub fn due_reports(last: NaiveDateTime, now: NaiveDateTime, daily_hour: u32) -> Vec<ReportKind> {
    let mut due = Vec::new();
    if now <= last {
        return due;
    }

    if now.date() != last.date() || now.hour() != last.hour() {
        due.push(ReportKind::Hourly);
    }

    let trigger = now.date().and_hms_opt(daily_hour, 0, 0);
    if let Some(trigger) = trigger {
        if last < trigger && trigger <= now {
            due.push(ReportKind::Daily);
        }
    }

    due
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the tick loop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);

        if let Err(e) = self.task.await {
            log::error!("Scheduler task failed: {}", e);
        }
    }
}

pub fn spawn(
    workflow_channel: mpsc::Sender<WorkflowRequest>,
    daily_hour: u32,
    period: Duration,
) -> SchedulerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Local::now().naive_local();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Local::now().naive_local();
                    for kind in due_reports(last, now, daily_hour) {
                        log::info!("Requesting {:?} report.", kind);
                        if workflow_channel.send(WorkflowRequest::Report(kind)).await.is_err() {
                            log::warn!("Workflow channel closed, scheduler exiting.");
                            return;
                        }
                    }
                    last = now;
                }
                _ = shutdown_rx.changed() => {
                    log::info!("Scheduler stopped.");
                    return;
                }
            }
        }
    });

    SchedulerHandle {
        shutdown: shutdown_tx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn nothing_due_within_the_same_hour() {
        assert!(due_reports(at(1, 10, 5), at(1, 10, 6), 8).is_empty());
    }

    #[test]
    fn hourly_due_on_hour_change() {
        assert_eq!(
            due_reports(at(1, 10, 59), at(1, 11, 0), 8),
            vec![ReportKind::Hourly]
        );
    }

    #[test]
    fn daily_due_at_configured_hour() {
        assert_eq!(
            due_reports(at(1, 7, 59), at(1, 8, 0), 8),
            vec![ReportKind::Hourly, ReportKind::Daily]
        );
        assert_eq!(
            due_reports(at(1, 8, 0), at(1, 8, 1), 8),
            Vec::<ReportKind>::new()
        );
    }

    #[test]
    fn daily_due_once_across_midnight() {
        let due = due_reports(at(1, 23, 59), at(2, 0, 0), 0);
        assert_eq!(due, vec![ReportKind::Hourly, ReportKind::Daily]);
        assert!(!due_reports(at(2, 0, 0), at(2, 0, 1), 0).contains(&ReportKind::Daily));
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        assert!(due_reports(at(1, 9, 0), at(1, 8, 0), 8).is_empty());
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_task() {
        let (tx, _rx) = mpsc::channel(8);
        let handle = spawn(tx, 8, Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("scheduler did not stop");
    }
}
