//! Notification policy: turns a cycle report into the payloads to deliver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::CycleReport;
use crate::probe::{OutcomeKind, ProbeOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Error,
    Success,
    Test,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per-URL line of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detail {
    pub url: String,
    pub status: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&ProbeOutcome> for Detail {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            url: outcome.url.clone(),
            status: outcome.kind(),
            status_code: outcome.status_code(),
            response_time: outcome.response_time_ms(),
            error: outcome.error_message().map(str::to_string),
            timestamp: Some(outcome.timestamp),
        }
    }
}

/// The message handed to the webhook dispatcher before per-format rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    #[serde(default)]
    pub details: Vec<Detail>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Decides which notifications a finished cycle produces.
///
/// Failures always produce exactly one `error` payload. A fully healthy cycle
/// produces a `success` payload only when `notify_success` is set. A cycle
/// that probed nothing produces nothing.
pub fn decide(report: &CycleReport, notify_success: bool) -> Vec<NotificationPayload> {
    if report.total == 0 {
        return Vec::new();
    }

    if !report.failed.is_empty() {
        return vec![NotificationPayload {
            notification_type: NotificationType::Error,
            message: format!("🚨 {} app(s) are down!", report.failed.len()),
            details: report.failed.iter().map(Detail::from).collect(),
            summary: format!("{}/{} apps responding", report.success_count, report.total),
            timestamp: Utc::now(),
        }];
    }

    if notify_success {
        return vec![NotificationPayload {
            notification_type: NotificationType::Success,
            message: format!("✅ All {} apps are healthy!", report.success_count),
            details: report.succeeded.iter().map(Detail::from).collect(),
            summary: "All apps responding normally".to_string(),
            timestamp: Utc::now(),
        }];
    }

    Vec::new()
}

/// Synthetic payload for checking webhook wiring without probing anything.
pub fn test_payload() -> NotificationPayload {
    NotificationPayload {
        notification_type: NotificationType::Test,
        message: "🧪 Test notification from OnRender Pinger".to_string(),
        details: vec![Detail {
            url: "https://test-example.com".to_string(),
            status: OutcomeKind::Success,
            status_code: None,
            response_time: Some(150),
            error: None,
            timestamp: None,
        }],
        summary: "This is a test webhook notification".to_string(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<ProbeOutcome>) -> CycleReport {
        CycleReport::from_outcomes(Utc::now(), outcomes)
    }

    fn healthy() -> CycleReport {
        report(vec![
            ProbeOutcome::success("https://a.test", 200, 30),
            ProbeOutcome::success("https://b.test", 200, 45),
        ])
    }

    fn one_down() -> CycleReport {
        report(vec![
            ProbeOutcome::success("https://a.test", 200, 30),
            ProbeOutcome::error("https://b.test", "timeout of 30000ms exceeded"),
        ])
    }

    #[test]
    fn failures_produce_one_error_payload_regardless_of_flag() {
        for flag in [false, true] {
            let payloads = decide(&one_down(), flag);
            assert_eq!(payloads.len(), 1);
            let p = &payloads[0];
            assert_eq!(p.notification_type, NotificationType::Error);
            assert_eq!(p.message, "🚨 1 app(s) are down!");
            assert_eq!(p.summary, "1/2 apps responding");
            assert_eq!(p.details.len(), 1);
            assert_eq!(p.details[0].url, "https://b.test");
            assert_eq!(p.details[0].status, OutcomeKind::Error);
            assert_eq!(p.details[0].error.as_deref(), Some("timeout of 30000ms exceeded"));
        }
    }

    #[test]
    fn healthy_cycle_is_silent_by_default() {
        assert!(decide(&healthy(), false).is_empty());
    }

    #[test]
    fn healthy_cycle_notifies_when_opted_in() {
        let payloads = decide(&healthy(), true);
        assert_eq!(payloads.len(), 1);
        let p = &payloads[0];
        assert_eq!(p.notification_type, NotificationType::Success);
        assert_eq!(p.message, "✅ All 2 apps are healthy!");
        assert_eq!(p.summary, "All apps responding normally");
        assert_eq!(p.details.len(), 2);
        assert_eq!(p.details[1].response_time, Some(45));
    }

    #[test]
    fn empty_cycle_never_notifies() {
        assert!(decide(&CycleReport::empty(Utc::now()), true).is_empty());
    }

    #[test]
    fn test_payload_has_single_synthetic_detail() {
        let p = test_payload();
        assert_eq!(p.notification_type, NotificationType::Test);
        assert_eq!(p.details.len(), 1);
        assert_eq!(p.details[0].url, "https://test-example.com");
        assert_eq!(p.details[0].response_time, Some(150));
    }

    #[test]
    fn detail_omits_absent_fields_on_the_wire() {
        let v = serde_json::to_value(&test_payload().details[0]).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "url": "https://test-example.com",
                "status": "success",
                "responseTime": 150
            })
        );
    }
}
