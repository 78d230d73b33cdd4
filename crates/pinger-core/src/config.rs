use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a pinger instance.
///
/// The URL and webhook lists are kept as the raw comma-separated strings they
/// were configured with and are resolved again on every cycle and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingerConfig {
    /// Comma-separated target URLs.
    pub ping_urls: String,
    /// Comma-separated webhook endpoint URLs. May be empty.
    pub webhook_urls: String,
    /// Time between automatic cycles (default: 900s).
    pub interval: Duration,
    /// Delay before the first automatic cycle after start (default: 5s).
    pub initial_delay: Duration,
    /// HTTP timeout for a single probe (default: 30s).
    pub probe_timeout: Duration,
    /// HTTP timeout for a single webhook POST (default: 10s).
    pub webhook_timeout: Duration,
    /// Emit a success notification when every target responded.
    pub notify_success: bool,
    /// Minimum time between two accepted manual triggers (default: 60s).
    pub manual_min_interval: Duration,
    /// Whether the status endpoint also kicks a guarded background cycle.
    pub trigger_on_status: bool,
    /// Classify completed non-2xx responses as failures.
    pub strict_status: bool,
    pub user_agent: String,
}

pub const DEFAULT_USER_AGENT: &str = "OnRender-Pinger/1.0";

impl Default for PingerConfig {
    fn default() -> Self {
        Self {
            ping_urls: String::new(),
            webhook_urls: String::new(),
            interval: Duration::from_secs(900),
            initial_delay: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(30),
            webhook_timeout: Duration::from_secs(10),
            notify_success: false,
            manual_min_interval: Duration::from_secs(60),
            trigger_on_status: false,
            strict_status: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PingerConfig {
    pub fn with_ping_urls(mut self, urls: impl Into<String>) -> Self {
        self.ping_urls = urls.into();
        self
    }

    pub fn with_webhook_urls(mut self, webhooks: impl Into<String>) -> Self {
        self.webhook_urls = webhooks.into();
        self
    }

    /// Sets the cycle interval. Zero is clamped to one second.
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    pub fn with_notify_success(mut self, enabled: bool) -> Self {
        self.notify_success = enabled;
        self
    }

    pub fn with_manual_min_interval(mut self, interval: Duration) -> Self {
        self.manual_min_interval = interval;
        self
    }

    pub fn with_trigger_on_status(mut self, enabled: bool) -> Self {
        self.trigger_on_status = enabled;
        self
    }

    pub fn with_strict_status(mut self, enabled: bool) -> Self {
        self.strict_status = enabled;
        self
    }

    /// Human-readable schedule, e.g. "Every 15 minutes".
    pub fn schedule_description(&self) -> String {
        let secs = self.interval.as_secs();
        if secs % 60 == 0 {
            let minutes = secs / 60;
            if minutes == 1 {
                "Every minute".to_string()
            } else {
                format!("Every {} minutes", minutes)
            }
        } else {
            format!("Every {} seconds", secs)
        }
    }
}
