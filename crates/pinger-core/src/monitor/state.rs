use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::cycle::CycleReport;
use crate::webhook::DispatchSummary;

const NEVER: i64 = i64::MIN;

/// Minimum-interval throttle for manual triggers.
///
/// The last accepted trigger is a single atomic value: readers never lock, and
/// two near-simultaneous triggers may both pass the check.
#[derive(Debug)]
pub struct ManualTriggerGuard {
    min_interval: Duration,
    last_trigger_ms: AtomicI64,
}

impl ManualTriggerGuard {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_trigger_ms: AtomicI64::new(NEVER),
        }
    }

    /// Records `now` as the last trigger when the interval has elapsed.
    /// Otherwise returns how long the caller still has to wait.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<(), Duration> {
        let now_ms = now.timestamp_millis();
        let last = self.last_trigger_ms.load(Ordering::Acquire);
        if last != NEVER {
            let elapsed_ms = now_ms.saturating_sub(last).max(0) as u128;
            let min_ms = self.min_interval.as_millis();
            if elapsed_ms < min_ms {
                let wait_ms = u64::try_from(min_ms - elapsed_ms).unwrap_or(u64::MAX);
                return Err(Duration::from_millis(wait_ms));
            }
        }
        self.last_trigger_ms.store(now_ms, Ordering::Release);
        Ok(())
    }

    pub fn last_trigger(&self) -> Option<DateTime<Utc>> {
        match self.last_trigger_ms.load(Ordering::Acquire) {
            NEVER => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }
}

/// Running counters, exported through the status and metrics endpoints.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    cycles: AtomicU64,
    probes: AtomicU64,
    probe_failures: AtomicU64,
    notifications: AtomicU64,
    webhook_deliveries: AtomicU64,
    webhook_failures: AtomicU64,
    last_total: AtomicU64,
    last_success: AtomicU64,
}

impl SchedulerStats {
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.probes.fetch_add(report.total as u64, Ordering::Relaxed);
        self.probe_failures
            .fetch_add(report.failed_count() as u64, Ordering::Relaxed);
        self.last_total.store(report.total as u64, Ordering::Relaxed);
        self.last_success
            .store(report.success_count as u64, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, summary: DispatchSummary) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        self.webhook_deliveries
            .fetch_add(summary.delivered as u64, Ordering::Relaxed);
        self.webhook_failures
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            webhook_deliveries: self.webhook_deliveries.load(Ordering::Relaxed),
            webhook_failures: self.webhook_failures.load(Ordering::Relaxed),
            last_cycle_total: self.last_total.load(Ordering::Relaxed),
            last_cycle_success: self.last_success.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub probes: u64,
    pub probe_failures: u64,
    pub notifications: u64,
    pub webhook_deliveries: u64,
    pub webhook_failures: u64,
    pub last_cycle_total: u64,
    pub last_cycle_success: u64,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: f64,
    pub interval_secs: u64,
    pub schedule: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_manual_trigger_at: Option<DateTime<Utc>>,
    pub stats: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;

    #[test]
    fn first_trigger_always_passes() {
        let guard = ManualTriggerGuard::new(Duration::from_secs(60));
        assert!(guard.last_trigger().is_none());
        let now = Utc::now();
        assert!(guard.try_acquire(now).is_ok());
        assert_eq!(
            guard.last_trigger().map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn trigger_inside_interval_is_throttled() {
        let guard = ManualTriggerGuard::new(Duration::from_secs(60));
        let t0 = Utc::now();
        guard.try_acquire(t0).unwrap();

        let wait = guard
            .try_acquire(t0 + chrono::Duration::seconds(20))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(40));
        // A rejected trigger does not move the window.
        assert_eq!(
            guard.last_trigger().map(|t| t.timestamp_millis()),
            Some(t0.timestamp_millis())
        );

        assert!(guard.try_acquire(t0 + chrono::Duration::seconds(60)).is_ok());
    }

    #[test]
    fn huge_interval_saturates_the_wait() {
        let guard = ManualTriggerGuard::new(Duration::MAX);
        let t0 = Utc::now();
        guard.try_acquire(t0).unwrap();

        let wait = guard
            .try_acquire(t0 + chrono::Duration::seconds(1))
            .unwrap_err();
        assert_eq!(wait, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn zero_interval_never_throttles() {
        let guard = ManualTriggerGuard::new(Duration::ZERO);
        let now = Utc::now();
        assert!(guard.try_acquire(now).is_ok());
        assert!(guard.try_acquire(now).is_ok());
    }

    #[test]
    fn stats_accumulate_cycles_and_dispatches() {
        let stats = SchedulerStats::default();
        let report = CycleReport::from_outcomes(
            Utc::now(),
            vec![
                ProbeOutcome::success("https://a.test", 200, 5),
                ProbeOutcome::error("https://b.test", "refused"),
            ],
        );
        stats.record_cycle(&report);
        stats.record_dispatch(DispatchSummary {
            attempted: 3,
            delivered: 2,
            failed: 1,
        });

        let snap = stats.snapshot();
        assert_eq!(snap.cycles, 1);
        assert_eq!(snap.probes, 2);
        assert_eq!(snap.probe_failures, 1);
        assert_eq!(snap.notifications, 1);
        assert_eq!(snap.webhook_deliveries, 2);
        assert_eq!(snap.webhook_failures, 1);
        assert_eq!(snap.last_cycle_total, 2);
        assert_eq!(snap.last_cycle_success, 1);
    }
}
