use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use pinger_core::{truncate_for_log, SchedulerStatus, TriggerError};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualTriggerState {
    Disabled,
    Started,
    Throttled,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub message: String,
    pub status: String,
    pub monitored_urls: usize,
    pub urls: Vec<String>,
    pub webhooks: usize,
    pub webhook_urls: Vec<String>,
    pub next_ping: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub manual_trigger: ManualTriggerState,
    pub uptime: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingNowResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlsResponse {
    pub urls: Vec<String>,
    pub url_count: usize,
    pub webhooks: usize,
    pub webhook_urls: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/ping-now", get(ping_now))
        .route("/test-webhook", get(test_webhook))
        .route("/urls", get(list_urls))
        .route("/status", get(status))
}

fn redacted_webhooks(webhooks: &[String]) -> Vec<String> {
    webhooks.iter().map(|w| truncate_for_log(w)).collect()
}

/// GET /
async fn overview(State(state): State<AppState>) -> Json<OverviewResponse> {
    let scheduler = &state.scheduler;

    let manual_trigger = if !scheduler.config().trigger_on_status {
        ManualTriggerState::Disabled
    } else if scheduler.trigger_in_background().is_ok() {
        ManualTriggerState::Started
    } else {
        ManualTriggerState::Throttled
    };

    let urls = scheduler.configured_urls();
    let webhooks = scheduler.webhook_urls();
    let status = scheduler.status().await;

    Json(OverviewResponse {
        message: "OnRender Pinger is running!".into(),
        status: "active".into(),
        monitored_urls: urls.len(),
        urls,
        webhooks: webhooks.len(),
        webhook_urls: redacted_webhooks(&webhooks),
        next_ping: status.schedule,
        next_run_at: status.next_run_at,
        manual_trigger,
        uptime: status.uptime_secs,
        timestamp: Utc::now(),
    })
}

/// GET /ping-now
async fn ping_now(State(state): State<AppState>) -> Result<Json<PingNowResponse>, ApiError> {
    match state.scheduler.trigger_manual().await {
        Ok(report) => Ok(Json(PingNowResponse {
            message: "Manual ping completed".into(),
            timestamp: Utc::now(),
            total: report.total,
            successful: report.success_count,
            failed: report.failed_count(),
        })),
        Err(e @ TriggerError::Throttled { retry_after }) => Err(ApiError::TooManyRequests {
            message: e.to_string(),
            retry_after_secs: retry_after.as_secs().max(1),
        }),
        Err(e @ TriggerError::Failed(_)) => Err(ApiError::Internal {
            context: "Failed to complete manual ping".into(),
            message: e.to_string(),
        }),
    }
}

/// GET /test-webhook
async fn test_webhook(State(state): State<AppState>) -> Json<TestWebhookResponse> {
    let summary = state.scheduler.send_test_notification().await;
    Json(TestWebhookResponse {
        message: "Test webhook notifications sent".into(),
        timestamp: Utc::now(),
        delivered: summary.delivered,
        failed: summary.failed,
    })
}

/// GET /urls
async fn list_urls(State(state): State<AppState>) -> Json<UrlsResponse> {
    let urls = state.scheduler.configured_urls();
    let webhooks = state.scheduler.webhook_urls();
    Json(UrlsResponse {
        url_count: urls.len(),
        urls,
        webhooks: webhooks.len(),
        webhook_urls: redacted_webhooks(&webhooks),
    })
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}
