//! In-process scheduler for message dispatch and recurring billing.
//!
//! Runs the same jobs as the cron endpoints on a fixed interval. Recurring
//! billing runs at most once per calendar day per process.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::external::Notifier;
use crate::services::{MessagingService, TuitionService};

/// Run the scheduler loop until `cancel` is triggered.
pub async fn run(pool: PgPool, notifier: Arc<dyn Notifier>, interval_secs: u64, cancel: CancellationToken) {
    let period = Duration::from_secs(interval_secs.max(5));
    tracing::info!(interval_secs = period.as_secs(), "Scheduler started");

    let messaging = MessagingService::new(pool.clone());
    let tuition = TuitionService::new(pool);
    let mut last_billing_run: Option<NaiveDate> = None;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                let now = Utc::now();

                match messaging.dispatch_due_messages(now, notifier.as_ref()).await {
                    Ok(summary) if summary.claimed > 0 => {
                        tracing::info!(claimed = summary.claimed, failed = summary.failed, "Scheduler: messages dispatched");
                    }
                    Ok(_) => tracing::debug!("Scheduler: no messages due"),
                    Err(e) => tracing::error!(error = %e, "Scheduler: message dispatch failed"),
                }

                let today = now.date_naive();
                if should_run_billing(last_billing_run, today) {
                    match tuition.run_recurring_billing(today, notifier.clone()).await {
                        Ok(summary) => {
                            last_billing_run = Some(today);
                            tracing::info!(
                                invoices_created = summary.invoices_created,
                                failed = summary.failed,
                                "Scheduler: recurring billing finished"
                            );
                        }
                        Err(e) => tracing::error!(error = %e, "Scheduler: recurring billing failed"),
                    }
                }
            }
        }
    }
}

fn should_run_billing(last_run: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_run.map_or(true, |last| last < today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_runs_once_per_day() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        assert!(should_run_billing(None, today));
        assert!(!should_run_billing(Some(today), today));
        assert!(should_run_billing(today.pred_opt(), today));
    }
}
