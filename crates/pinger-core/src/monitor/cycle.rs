use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::probe::{ProbeOutcome, Prober};
use crate::targets::resolve_targets;

/// Aggregate of every probe outcome from one cycle.
///
/// Both outcome lists keep the configured URL order, and
/// `success_count + failed.len() == total` always holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub success_count: usize,
    pub succeeded: Vec<ProbeOutcome>,
    pub failed: Vec<ProbeOutcome>,
}

impl CycleReport {
    /// Report for a cycle that had nothing to probe.
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self::from_outcomes(started_at, Vec::new())
    }

    pub fn from_outcomes(started_at: DateTime<Utc>, outcomes: Vec<ProbeOutcome>) -> Self {
        let total = outcomes.len();
        let (succeeded, failed): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(ProbeOutcome::is_success);
        Self {
            cycle_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            total,
            success_count: succeeded.len(),
            succeeded,
            failed,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Probes every configured target once, concurrently, and aggregates the outcomes.
///
/// The target list is resolved from `raw_urls` on every call. When nothing
/// resolves, no probe is sent and an empty report comes back. Each probe runs
/// in its own task, so a panicking prober only fails its own target.
pub async fn run_cycle(prober: Arc<dyn Prober>, raw_urls: &str) -> CycleReport {
    let started_at = Utc::now();
    let targets = resolve_targets(raw_urls);

    if targets.is_empty() {
        warn!("No valid URLs to ping, skipping cycle");
        return CycleReport::empty(started_at);
    }

    info!(count = targets.len(), "Starting ping cycle");

    let handles = targets.iter().map(|target| {
        let prober = Arc::clone(&prober);
        let url = target.as_str().to_string();
        tokio::spawn(async move { prober.probe(&url).await })
    });

    // join_all keeps input order, so outcomes line up with `targets`.
    let outcomes: Vec<ProbeOutcome> = join_all(handles)
        .await
        .into_iter()
        .zip(&targets)
        .map(|(joined, target)| {
            joined.unwrap_or_else(|e| {
                warn!(url = %target, error = %e, "Probe task aborted");
                ProbeOutcome::error(target.as_str(), format!("probe aborted: {}", e))
            })
        })
        .collect();
    let report = CycleReport::from_outcomes(started_at, outcomes);

    info!(
        cycle_id = %report.cycle_id,
        failed = report.failed_count(),
        "Ping cycle completed: {}/{} successful",
        report.success_count,
        report.total
    );
    report
}
