//! Webhook delivery.
//!
//! A [`NotificationPayload`] is rendered once per endpoint in the dialect that
//! endpoint expects ([`WebhookFormat`]) and POSTed to every configured endpoint
//! concurrently. A failing endpoint is logged and skipped; it never affects the
//! other deliveries or the caller.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PingerConfig;
use crate::notify::{Detail, NotificationPayload, NotificationType};
use crate::targets::split_list;

/// Service tag carried by generic payloads.
pub const SERVICE_NAME: &str = "OnRender Pinger";

const DISCORD_RED: u32 = 15158332;
const DISCORD_GREEN: u32 = 3066993;

/// Characters of an endpoint URL that may appear in logs. Webhook URLs embed
/// their secret token in the path, so the tail is never logged.
const LOG_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFormat {
    Discord,
    Slack,
    Generic,
}

impl WebhookFormat {
    pub fn classify(endpoint: &str) -> Self {
        if endpoint.contains("discord.com") {
            Self::Discord
        } else if endpoint.contains("slack.com") {
            Self::Slack
        } else {
            Self::Generic
        }
    }
}

impl std::fmt::Display for WebhookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discord => write!(f, "discord"),
            Self::Slack => write!(f, "slack"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("endpoint answered HTTP {status}")]
    Status { status: u16 },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct GenericBody<'a> {
    timestamp: String,
    service: &'static str,
    #[serde(rename = "type")]
    notification_type: NotificationType,
    message: &'a str,
    details: &'a [Detail],
    summary: &'a str,
}

/// Renders the request body for one endpoint format.
pub fn render(format: WebhookFormat, payload: &NotificationPayload) -> Value {
    let is_error = payload.notification_type == NotificationType::Error;
    let timestamp = payload
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    match format {
        WebhookFormat::Discord => {
            let fields: Vec<Value> = payload
                .details
                .iter()
                .map(|d| {
                    json!({
                        "name": d.url,
                        "value": format!("Status: {}\n{}", d.status, discord_detail_line(d)),
                        "inline": true,
                    })
                })
                .collect();
            let (title, color) = if is_error {
                ("🚨 App Down Alert", DISCORD_RED)
            } else {
                ("✅ Apps Status Update", DISCORD_GREEN)
            };
            json!({
                "embeds": [{
                    "title": title,
                    "description": payload.message,
                    "color": color,
                    "timestamp": timestamp,
                    "fields": fields,
                }]
            })
        }
        WebhookFormat::Slack => {
            let fields: Vec<Value> = payload
                .details
                .iter()
                .map(|d| {
                    json!({
                        "title": d.url,
                        "value": slack_detail_line(d),
                        "short": true,
                    })
                })
                .collect();
            let color = if is_error { "danger" } else { "good" };
            json!({
                "text": payload.message,
                "attachments": [{
                    "color": color,
                    "fields": fields,
                    "ts": Utc::now().timestamp(),
                }]
            })
        }
        WebhookFormat::Generic => {
            let body = GenericBody {
                timestamp,
                service: SERVICE_NAME,
                notification_type: payload.notification_type,
                message: &payload.message,
                details: &payload.details,
                summary: &payload.summary,
            };
            serde_json::to_value(body).unwrap_or(Value::Null)
        }
    }
}

fn discord_detail_line(detail: &Detail) -> String {
    match &detail.error {
        Some(error) => error.clone(),
        None => format!("Response: {}ms", response_time_text(detail)),
    }
}

fn slack_detail_line(detail: &Detail) -> String {
    match &detail.error {
        Some(error) => error.clone(),
        None => format!("✅ {}ms", response_time_text(detail)),
    }
}

fn response_time_text(detail: &Detail) -> String {
    detail
        .response_time
        .map(|ms| ms.to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// First 50 characters of an endpoint followed by `...`, safe to log.
pub fn truncate_for_log(endpoint: &str) -> String {
    let prefix: String = endpoint.chars().take(LOG_PREFIX_CHARS).collect();
    format!("{}...", prefix)
}

/// Where the scheduler hands its notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Endpoints as currently configured.
    fn endpoints(&self) -> Vec<String>;

    async fn dispatch(&self, payload: &NotificationPayload) -> DispatchSummary;
}

/// Best-effort fan-out of notifications to the configured webhook endpoints.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    endpoints: String,
}

impl WebhookDispatcher {
    pub fn new(client: Client, endpoints: impl Into<String>) -> Self {
        Self {
            client,
            endpoints: endpoints.into(),
        }
    }

    pub fn from_config(config: &PingerConfig) -> reqwest::Result<Self> {
        let client = Self::build_client(config.webhook_timeout, &config.user_agent)?;
        Ok(Self::new(client, config.webhook_urls.clone()))
    }

    pub fn build_client(timeout: Duration, user_agent: &str) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
    }

    /// The endpoint list as configured right now.
    pub fn endpoints(&self) -> Vec<String> {
        split_list(&self.endpoints)
    }

    /// Delivers `payload` to every endpoint and waits for all attempts to settle.
    ///
    /// Never fails; the summary only reports how the attempts went.
    pub async fn dispatch(&self, payload: &NotificationPayload) -> DispatchSummary {
        let endpoints = self.endpoints();
        if endpoints.is_empty() {
            debug!(notification_type = %payload.notification_type, "No webhooks configured");
            return DispatchSummary::default();
        }

        let deliveries = endpoints.iter().map(|endpoint| async move {
            let format = WebhookFormat::classify(endpoint);
            let body = render(format, payload);
            let result = deliver(&self.client, endpoint, &body).await;
            let target = truncate_for_log(endpoint);
            match &result {
                Ok(()) => info!(
                    endpoint = %target,
                    %format,
                    notification_type = %payload.notification_type,
                    "Webhook sent"
                ),
                Err(e) => warn!(
                    endpoint = %target,
                    %format,
                    notification_type = %payload.notification_type,
                    error = %e,
                    "Webhook failed"
                ),
            }
            result.is_ok()
        });

        let results = join_all(deliveries).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        DispatchSummary {
            attempted: results.len(),
            delivered,
            failed: results.len() - delivered,
        }
    }
}

async fn deliver(client: &Client, url: &str, body: &Value) -> Result<(), DeliveryError> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Network(e.without_url().to_string())
        }
    })?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Status {
            status: response.status().as_u16(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookDispatcher {
    fn endpoints(&self) -> Vec<String> {
        WebhookDispatcher::endpoints(self)
    }

    async fn dispatch(&self, payload: &NotificationPayload) -> DispatchSummary {
        WebhookDispatcher::dispatch(self, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_payload;
    use crate::probe::OutcomeKind;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn error_payload() -> NotificationPayload {
        NotificationPayload {
            notification_type: NotificationType::Error,
            message: "🚨 1 app(s) are down!".into(),
            details: vec![Detail {
                url: "https://b.test".into(),
                status: OutcomeKind::Error,
                status_code: None,
                response_time: None,
                error: Some("timeout of 30000ms exceeded".into()),
                timestamp: Some(Utc::now()),
            }],
            summary: "1/2 apps responding".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn classify_by_substring() {
        assert_eq!(
            WebhookFormat::classify("https://discord.com/api/webhooks/1/abc"),
            WebhookFormat::Discord
        );
        assert_eq!(
            WebhookFormat::classify("https://hooks.slack.com/services/T/B/X"),
            WebhookFormat::Slack
        );
        assert_eq!(
            WebhookFormat::classify("https://example.com/hook"),
            WebhookFormat::Generic
        );
    }

    #[test]
    fn discord_body_uses_embeds() {
        let body = render(WebhookFormat::Discord, &error_payload());
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "🚨 App Down Alert");
        assert_eq!(embed["description"], "🚨 1 app(s) are down!");
        assert_eq!(embed["color"], 15158332);
        assert_eq!(embed["fields"][0]["name"], "https://b.test");
        assert_eq!(
            embed["fields"][0]["value"],
            "Status: error\ntimeout of 30000ms exceeded"
        );
        assert_eq!(embed["fields"][0]["inline"], true);
        assert!(body.get("attachments").is_none());
    }

    #[test]
    fn discord_success_detail_shows_response_time() {
        let body = render(WebhookFormat::Discord, &test_payload());
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "✅ Apps Status Update");
        assert_eq!(embed["color"], 3066993);
        assert_eq!(embed["fields"][0]["value"], "Status: success\nResponse: 150ms");
    }

    #[test]
    fn slack_body_uses_attachments() {
        let body = render(WebhookFormat::Slack, &error_payload());
        assert_eq!(body["text"], "🚨 1 app(s) are down!");
        let attachment = &body["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["fields"][0]["title"], "https://b.test");
        assert_eq!(attachment["fields"][0]["value"], "timeout of 30000ms exceeded");
        assert_eq!(attachment["fields"][0]["short"], true);
        assert!(attachment["ts"].is_i64());
        assert!(body.get("embeds").is_none());

        let ok = render(WebhookFormat::Slack, &test_payload());
        assert_eq!(ok["attachments"][0]["color"], "good");
        assert_eq!(ok["attachments"][0]["fields"][0]["value"], "✅ 150ms");
    }

    #[test]
    fn generic_body_is_full_payload() {
        let payload = error_payload();
        let body = render(WebhookFormat::Generic, &payload);
        assert_eq!(body["service"], "OnRender Pinger");
        assert_eq!(body["type"], "error");
        assert_eq!(body["message"], payload.message);
        assert_eq!(body["summary"], "1/2 apps responding");
        assert_eq!(body["details"][0]["status"], "error");
        assert_eq!(body["details"][0]["error"], "timeout of 30000ms exceeded");
        assert!(body["timestamp"].is_string());
        assert!(body.get("embeds").is_none());
        assert!(body.get("attachments").is_none());
    }

    #[test]
    fn truncation_keeps_first_fifty_chars() {
        let long = format!("https://discord.com/api/webhooks/{}", "x".repeat(80));
        let shown = truncate_for_log(&long);
        assert_eq!(shown.len(), 53);
        assert!(shown.ends_with("..."));
        assert!(long.starts_with(&shown[..50]));
        assert_eq!(truncate_for_log("https://a.test"), "https://a.test...");
    }

    #[tokio::test]
    async fn empty_endpoint_list_is_a_no_op() {
        let dispatcher = WebhookDispatcher::new(Client::new(), " , ");
        let summary = dispatcher.dispatch(&error_payload()).await;
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn one_failing_endpoint_does_not_block_the_others() {
        let good_a = MockServer::start().await;
        let good_b = MockServer::start().await;
        let bad = MockServer::start().await;

        for server in [&good_a, &good_b] {
            Mock::given(method("POST"))
                .and(path("/hook"))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&bad)
            .await;

        let endpoints = format!(
            "{}/hook,{}/hook,{}/hook",
            good_a.uri(),
            bad.uri(),
            good_b.uri()
        );
        let dispatcher = WebhookDispatcher::new(Client::new(), endpoints);
        let summary = dispatcher.dispatch(&error_payload()).await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_counted_as_failed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher = WebhookDispatcher::new(Client::new(), format!("http://{}/hook", addr));
        let summary = dispatcher.dispatch(&error_payload()).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.delivered, 0);
    }

    #[tokio::test]
    async fn each_endpoint_receives_its_own_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/discord.com/api/webhooks/1"))
            .and(body_partial_json(json!({ "embeds": [{ "title": "🚨 App Down Alert" }] })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hooks.slack.com/services/T"))
            .and(body_partial_json(json!({ "attachments": [{ "color": "danger" }] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generic"))
            .and(body_partial_json(json!({ "service": "OnRender Pinger", "type": "error" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let endpoints = format!(
            "{0}/discord.com/api/webhooks/1,{0}/hooks.slack.com/services/T,{0}/generic",
            server.uri()
        );
        let dispatcher = WebhookDispatcher::new(Client::new(), endpoints);
        let summary = dispatcher.dispatch(&error_payload()).await;
        assert_eq!(summary.delivered, 3);
    }
}
