#![forbid(unsafe_code)]

pub mod config;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod targets;
pub mod webhook;

pub use config::PingerConfig;
pub use monitor::{
    run_cycle, CycleReport, ManualTriggerGuard, Scheduler, SchedulerStats, SchedulerStatus,
    StatsSnapshot, TriggerError, MAX_TIMER_SPAN,
};
pub use notify::{decide, test_payload, Detail, NotificationPayload, NotificationType};
pub use probe::{HttpProber, OutcomeKind, ProbeOutcome, ProbeResult, Prober};
pub use targets::{resolve_targets, split_list, TargetUrl};
pub use webhook::{
    render, truncate_for_log, DeliveryError, DispatchSummary, Notifier, WebhookDispatcher,
    WebhookFormat,
};
