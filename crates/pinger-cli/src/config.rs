//! Configuration file schema, environment overlay and validation.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! log_format = "json"
//!
//! [pinger]
//! urls = ["https://api.onrender.com/health", "https://web.onrender.com"]
//! webhooks = "https://discord.com/api/webhooks/123/abc"
//! interval_secs = 600
//! notify_success = false
//! ```
//!
//! Every value can be overridden from the environment (`PING_URLS`,
//! `WEBHOOK_URLS`, `PING_INTERVAL`, `NOTIFY_SUCCESS`, `PORT`, `LOG_FORMAT`,
//! `MANUAL_MIN_INTERVAL`, `TRIGGER_ON_STATUS`, `STRICT_STATUS`).

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use pinger_core::{split_list, PingerConfig, TargetUrl, MAX_TIMER_SPAN};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pinger: PingerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_format: default_log_format(),
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

fn default_log_format() -> String {
    "pretty".into()
}

/// A URL list written either as one comma-separated string or as an array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UrlList {
    Joined(String),
    Items(Vec<String>),
}

impl Default for UrlList {
    fn default() -> Self {
        UrlList::Joined(String::new())
    }
}

impl UrlList {
    /// The comma-separated form the core resolves on every cycle.
    pub fn joined(&self) -> String {
        match self {
            UrlList::Joined(s) => s.clone(),
            UrlList::Items(items) => items.join(","),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PingerSection {
    #[serde(default)]
    pub urls: UrlList,

    #[serde(default)]
    pub webhooks: UrlList,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub notify_success: bool,

    #[serde(default = "default_manual_min_interval_secs")]
    pub manual_min_interval_secs: u64,

    #[serde(default)]
    pub trigger_on_status: bool,

    #[serde(default)]
    pub strict_status: bool,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl Default for PingerSection {
    fn default() -> Self {
        Self {
            urls: UrlList::default(),
            webhooks: UrlList::default(),
            interval_secs: default_interval_secs(),
            notify_success: false,
            manual_min_interval_secs: default_manual_min_interval_secs(),
            trigger_on_status: false,
            strict_status: false,
            probe_timeout_secs: default_probe_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    900
}

fn default_manual_min_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_initial_delay_secs() -> u64 {
    5
}

impl PingerSection {
    pub fn to_pinger_config(&self) -> PingerConfig {
        PingerConfig::default()
            .with_ping_urls(self.urls.joined())
            .with_webhook_urls(self.webhooks.joined())
            .with_interval_secs(self.interval_secs)
            .with_notify_success(self.notify_success)
            .with_manual_min_interval(Duration::from_secs(self.manual_min_interval_secs))
            .with_trigger_on_status(self.trigger_on_status)
            .with_strict_status(self.strict_status)
            .with_probe_timeout(Duration::from_secs(self.probe_timeout_secs))
            .with_webhook_timeout(Duration::from_secs(self.webhook_timeout_secs))
            .with_initial_delay(Duration::from_secs(self.initial_delay_secs))
    }
}

impl AppConfig {
    /// Reads the optional config file, overlays `env`, then validates.
    pub fn load<I>(path: Option<&Path>, env: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    format!("Failed to read config file {}: {}", path.display(), e)
                })?;
                toml::from_str(&content).map_err(|e| {
                    format!("Failed to parse config file {}: {}", path.display(), e)
                })?
            }
            None => AppConfig::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides file values with the recognised environment variables.
    /// Unknown keys are ignored.
    pub fn apply_env<I>(&mut self, env: I) -> Result<(), String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in env {
            match key.as_str() {
                "PING_URLS" => self.pinger.urls = UrlList::Joined(value),
                "WEBHOOK_URLS" => self.pinger.webhooks = UrlList::Joined(value),
                "PING_INTERVAL" => self.pinger.interval_secs = parse_number(&key, &value)?,
                "NOTIFY_SUCCESS" => self.pinger.notify_success = parse_flag(&value),
                "PORT" => self.server.port = parse_number(&key, &value)?,
                "LOG_FORMAT" => self.server.log_format = value.trim().to_string(),
                "MANUAL_MIN_INTERVAL" => {
                    self.pinger.manual_min_interval_secs = parse_number(&key, &value)?
                }
                "TRIGGER_ON_STATUS" => self.pinger.trigger_on_status = parse_flag(&value),
                "STRICT_STATUS" => self.pinger.strict_status = parse_flag(&value),
                _ => {}
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), String> {
        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        if self.pinger.interval_secs == 0 {
            return Err("Ping interval must be at least 1 second".into());
        }
        if self.pinger.probe_timeout_secs == 0 {
            return Err("probe_timeout_secs must be at least 1".into());
        }
        if self.pinger.webhook_timeout_secs == 0 {
            return Err("webhook_timeout_secs must be at least 1".into());
        }

        let max_secs = MAX_TIMER_SPAN.as_secs();
        for (name, secs) in [
            ("interval_secs", self.pinger.interval_secs),
            ("initial_delay_secs", self.pinger.initial_delay_secs),
            ("manual_min_interval_secs", self.pinger.manual_min_interval_secs),
            ("probe_timeout_secs", self.pinger.probe_timeout_secs),
            ("webhook_timeout_secs", self.pinger.webhook_timeout_secs),
        ] {
            if secs > max_secs {
                return Err(format!(
                    "{} is {}s, must be at most {}s (one year)",
                    name, secs, max_secs
                ));
            }
        }

        let entries = split_list(&self.pinger.urls.joined());
        if entries.is_empty() {
            return Err("PING_URLS is required (comma-separated list of URLs to ping)".into());
        }
        if !entries.iter().any(|e| TargetUrl::parse(e).is_ok()) {
            return Err(format!(
                "No valid URLs to ping ({} configured, none parsed)",
                entries.len()
            ));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for {}: '{}' is not a number", key, value))
}

/// Only the literal `true` (any case) enables a flag.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
