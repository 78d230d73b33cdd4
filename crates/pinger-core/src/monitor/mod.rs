pub mod cycle;
pub mod scheduler;
pub mod state;

pub use cycle::{run_cycle, CycleReport};
pub use scheduler::{Scheduler, TriggerError, MAX_TIMER_SPAN};
pub use state::{ManualTriggerGuard, SchedulerStats, SchedulerStatus, StatsSnapshot};
