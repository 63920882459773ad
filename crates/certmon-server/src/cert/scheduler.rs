use chrono::{DateTime, Days, NaiveTime, Utc};
use std::sync::Arc;
use tokio::time::{interval, Duration};

use super::refresh::StatusRefreshJob;

/// Drives the status refresh job once a day and logs status counts on a
/// fixed interval. Failures are logged and the loop keeps going.
pub struct CertStatusScheduler {
    job: Arc<StatusRefreshJob>,
    threshold_days: u32,
    refresh_at: NaiveTime,
    stats_interval_secs: u64,
}

impl CertStatusScheduler {
    pub fn new(
        job: Arc<StatusRefreshJob>,
        threshold_days: u32,
        refresh_at: NaiveTime,
        stats_interval_secs: u64,
    ) -> Self {
        Self {
            job,
            threshold_days,
            refresh_at,
            stats_interval_secs,
        }
    }

    pub async fn run_daily_refresh(&self) {
        tracing::info!(
            refresh_at = %self.refresh_at,
            threshold_days = self.threshold_days,
            "Certificate status refresh scheduler started"
        );

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.refresh_at);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "Next certificate status refresh scheduled");
            tokio::time::sleep(wait).await;
            self.refresh_once().await;
        }
    }

    pub async fn run_stats_log(&self) {
        let mut tick = interval(Duration::from_secs(self.stats_interval_secs.max(1)));
        loop {
            tick.tick().await;
            self.log_statistics().await;
        }
    }

    /// One scheduled refresh as of today's UTC date, followed by the status
    /// counts it left behind.
    pub async fn refresh_once(&self) {
        let today = Utc::now().date_naive();
        let changed = match self.job.refresh_all(today, self.threshold_days).await {
            Ok(changed) => changed,
            Err(e) => {
                tracing::error!(error = %e, "Scheduled certificate status refresh failed");
                return;
            }
        };

        match self.job.statistics().await {
            Ok(stats) => tracing::info!(
                changed,
                as_of = %today,
                normal = stats.normal_count,
                expiring_soon = stats.expiring_soon_count,
                expired = stats.expired_count,
                "Scheduled certificate status refresh done"
            ),
            Err(e) => tracing::error!(
                changed,
                error = %e,
                "Refresh done but status statistics are unavailable"
            ),
        }
    }

    pub async fn log_statistics(&self) {
        let stats = match self.job.statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Failed to collect certificate status statistics");
                return;
            }
        };

        if stats.has_warnings() {
            tracing::warn!(
                normal = stats.normal_count,
                expiring_soon = stats.expiring_soon_count,
                expired = stats.expired_count,
                total = stats.total_count,
                "Certificates need attention"
            );
        } else {
            tracing::debug!(
                normal = stats.normal_count,
                total = stats.total_count,
                "Certificate status statistics"
            );
        }
    }
}

/// The first instant strictly after `now` whose UTC time of day is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return today;
    }
    now.date_naive()
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(at).and_utc())
        .unwrap_or(today)
}
