use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::cycle::{run_cycle, CycleReport};
use super::state::{ManualTriggerGuard, SchedulerStats, SchedulerStatus};
use crate::config::PingerConfig;
use crate::notify::{decide, test_payload};
use crate::probe::{HttpProber, Prober};
use crate::targets::split_list;
use crate::webhook::{DispatchSummary, Notifier, WebhookDispatcher};

/// Longest delay or period the timer accepts; larger configured values are clamped.
pub const MAX_TIMER_SPAN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("manual trigger throttled, retry in {}s", .retry_after.as_secs().max(1))]
    Throttled { retry_after: Duration },
    #[error("ping cycle failed: {0}")]
    Failed(String),
}

/// Drives cycle -> notification policy -> webhook dispatch, on a timer and on demand.
///
/// Runs never block each other: a tick that fires while the previous run is
/// still probing starts a second, independent run.
pub struct Scheduler {
    config: PingerConfig,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    guard: ManualTriggerGuard,
    stats: SchedulerStats,
    started_at: DateTime<Utc>,
    last_run: RwLock<Option<DateTime<Utc>>>,
    next_run: RwLock<Option<DateTime<Utc>>>,
}

impl Scheduler {
    pub fn new(
        config: PingerConfig,
        prober: Arc<dyn Prober>,
        dispatcher: WebhookDispatcher,
    ) -> Self {
        Self::with_notifier(config, prober, Arc::new(dispatcher))
    }

    /// Like [`Scheduler::new`], with any [`Notifier`] in place of the webhook dispatcher.
    pub fn with_notifier(
        config: PingerConfig,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            guard: ManualTriggerGuard::new(config.manual_min_interval),
            config,
            prober,
            notifier,
            stats: SchedulerStats::default(),
            started_at: Utc::now(),
            last_run: RwLock::new(None),
            next_run: RwLock::new(None),
        }
    }

    /// Builds a scheduler with the HTTP prober and webhook client described by `config`.
    pub fn from_config(config: PingerConfig) -> reqwest::Result<Self> {
        let prober = Arc::new(HttpProber::from_config(&config)?);
        let dispatcher = WebhookDispatcher::from_config(&config)?;
        Ok(Self::new(config, prober, dispatcher))
    }

    pub fn config(&self) -> &PingerConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Target list as configured, before URL validation.
    pub fn configured_urls(&self) -> Vec<String> {
        split_list(&self.config.ping_urls)
    }

    pub fn webhook_urls(&self) -> Vec<String> {
        self.notifier.endpoints()
    }

    pub async fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.read().await
    }

    pub async fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.read().await
    }

    /// One full run: probe every target, then deliver whatever the policy emits.
    pub async fn run_once(&self) -> CycleReport {
        *self.last_run.write().await = Some(Utc::now());

        let report = run_cycle(Arc::clone(&self.prober), &self.config.ping_urls).await;
        self.stats.record_cycle(&report);

        for payload in decide(&report, self.config.notify_success) {
            let summary = self.notifier.dispatch(&payload).await;
            debug!(
                notification_type = %payload.notification_type,
                delivered = summary.delivered,
                failed = summary.failed,
                "Notification dispatched"
            );
            self.stats.record_dispatch(summary);
        }

        report
    }

    /// Spawns the timer: one run after the initial delay, then one per interval.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let initial_delay = clamp_timer_span("initial_delay", self.config.initial_delay);
            let interval = clamp_timer_span("interval", self.config.interval);

            self.set_next_run(initial_delay).await;
            info!(
                initial_delay_secs = initial_delay.as_secs(),
                interval_secs = interval.as_secs(),
                "Scheduler started"
            );

            let first = Instant::now() + initial_delay;
            tokio::time::sleep_until(first).await;
            info!("Performing initial ping");
            self.spawn_run();

            let mut ticker = tokio::time::interval_at(first + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                self.set_next_run(interval).await;
                ticker.tick().await;
                self.spawn_run();
            }
        })
    }

    /// Runs a cycle on request, awaiting its report.
    ///
    /// Rejected when the previous manual trigger is more recent than
    /// `manual_min_interval`. The run executes in its own task, so a panic
    /// inside it comes back as [`TriggerError::Failed`].
    pub async fn trigger_manual(self: &Arc<Self>) -> Result<CycleReport, TriggerError> {
        self.acquire_manual()?;
        info!("Manual ping triggered");
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_once().await })
            .await
            .map_err(|e| TriggerError::Failed(e.to_string()))
    }

    /// Same throttle as [`Scheduler::trigger_manual`], but returns once the run is spawned.
    pub fn trigger_in_background(self: &Arc<Self>) -> Result<(), TriggerError> {
        self.acquire_manual()?;
        info!("Background ping triggered");
        self.spawn_run();
        Ok(())
    }

    /// Sends the synthetic test notification to every webhook. Probes nothing.
    pub async fn send_test_notification(&self) -> DispatchSummary {
        let summary = self.notifier.dispatch(&test_payload()).await;
        self.stats.record_dispatch(summary);
        summary
    }

    pub async fn status(&self) -> SchedulerStatus {
        let now = Utc::now();
        SchedulerStatus {
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0,
            interval_secs: self.config.interval.as_secs(),
            schedule: self.config.schedule_description(),
            last_run_at: self.last_run().await,
            next_run_at: self.next_run().await,
            last_manual_trigger_at: self.guard.last_trigger(),
            stats: self.stats.snapshot(),
        }
    }

    fn acquire_manual(&self) -> Result<(), TriggerError> {
        self.guard
            .try_acquire(Utc::now())
            .map_err(|retry_after| TriggerError::Throttled { retry_after })
    }

    fn spawn_run(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_once().await;
        });
    }

    async fn set_next_run(&self, after: Duration) {
        let next = chrono::Duration::from_std(after)
            .ok()
            .map(|d| Utc::now() + d);
        *self.next_run.write().await = next;
    }
}

fn clamp_timer_span(name: &str, span: Duration) -> Duration {
    if span > MAX_TIMER_SPAN {
        warn!(
            setting = name,
            configured_secs = span.as_secs(),
            max_secs = MAX_TIMER_SPAN.as_secs(),
            "Timer span too large, clamping"
        );
        MAX_TIMER_SPAN
    } else {
        span
    }
}
