use std::error::Error as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use super::{ProbeOutcome, Prober};
use crate::config::PingerConfig;

/// HTTP GET prober with a shared connection pool.
///
/// Success means the server answered: any status code counts unless
/// `strict_status` is set, in which case non-2xx answers become errors.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
    strict_status: bool,
}

impl HttpProber {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = Self::build_client(timeout, user_agent)?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            strict_status: false,
        }
    }

    pub fn from_config(config: &PingerConfig) -> reqwest::Result<Self> {
        let prober = Self::new(config.probe_timeout, &config.user_agent)?;
        Ok(prober.with_strict_status(config.strict_status))
    }

    pub fn with_strict_status(mut self, enabled: bool) -> Self {
        self.strict_status = enabled;
        self
    }

    /// `timeout` bounds the whole request, connect included, so a timeout
    /// error always reports the configured value.
    pub fn build_client(timeout: Duration, user_agent: &str) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(4)
            .gzip(true)
            .build()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        // `send` resolves once the response headers are in; the body is never read.
        match self.client.get(url).send().await {
            Ok(response) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                let status = response.status();

                if self.strict_status && !status.is_success() {
                    let reason = status.canonical_reason().unwrap_or("Unknown");
                    let message = format!("HTTP {} {}", status.as_u16(), reason);
                    warn!(
                        url,
                        status = status.as_u16(),
                        elapsed_ms,
                        "Probe returned non-success status"
                    );
                    return ProbeOutcome::error(url, message);
                }

                info!(url, status = status.as_u16(), elapsed_ms, "Probe succeeded");
                ProbeOutcome::success(url, status.as_u16(), elapsed_ms)
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("timeout of {}ms exceeded", self.timeout.as_millis())
                } else {
                    describe_error(&e)
                };
                warn!(url, error = %message, "Probe failed");
                ProbeOutcome::error(url, message)
            }
        }
    }
}

/// Flattens an error and its source chain into one line.
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::probe::OutcomeKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober(timeout: Duration) -> HttpProber {
        HttpProber::new(timeout, DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn probe_success_on_200_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "OnRender-Pinger/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = prober(Duration::from_secs(5)).probe(&format!("{}/", server.uri())).await;
        assert_eq!(outcome.kind(), OutcomeKind::Success);
        assert_eq!(outcome.status_code(), Some(200));
        assert!(outcome.response_time_ms().is_some());
    }

    #[tokio::test]
    async fn probe_treats_server_errors_as_alive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = prober(Duration::from_secs(5))
            .probe(&format!("{}/broken", server.uri()))
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.status_code(), Some(500));
    }

    #[tokio::test]
    async fn strict_status_turns_404_into_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = prober(Duration::from_secs(5))
            .with_strict_status(true)
            .probe(&format!("{}/missing", server.uri()))
            .await;
        assert_eq!(outcome.kind(), OutcomeKind::Error);
        assert_eq!(outcome.error_message(), Some("HTTP 404 Not Found"));
    }

    #[tokio::test]
    async fn probe_timeout_becomes_error_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let outcome = prober(Duration::from_millis(100))
            .probe(&format!("{}/slow", server.uri()))
            .await;
        assert_eq!(outcome.kind(), OutcomeKind::Error);
        assert_eq!(outcome.error_message(), Some("timeout of 100ms exceeded"));
        assert_eq!(outcome.status_code(), None);
    }

    #[tokio::test]
    async fn silent_server_reports_the_configured_timeout() {
        // Connections land in the backlog but nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let outcome = prober(Duration::from_millis(150))
            .probe(&format!("http://{}/", addr))
            .await;
        assert_eq!(outcome.error_message(), Some("timeout of 150ms exceeded"));
        drop(listener);
    }

    #[tokio::test]
    async fn probe_connection_refused_becomes_error_outcome() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = prober(Duration::from_secs(2))
            .probe(&format!("http://{}/", addr))
            .await;
        assert_eq!(outcome.kind(), OutcomeKind::Error);
        assert!(!outcome.error_message().unwrap().is_empty());
    }
}
