mod http;

pub use http::HttpProber;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Error,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What a probe observed. The variant decides which fields exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeResult {
    Success {
        #[serde(rename = "statusCode")]
        status_code: u16,
        #[serde(rename = "responseTime")]
        response_time_ms: u64,
    },
    Error {
        error: String,
    },
}

/// Result of probing one target URL. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub url: String,
    #[serde(flatten)]
    pub result: ProbeResult,
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn success(url: impl Into<String>, status_code: u16, response_time_ms: u64) -> Self {
        Self {
            url: url.into(),
            result: ProbeResult::Success {
                status_code,
                response_time_ms,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn error(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            result: ProbeResult::Error {
                error: error.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self.result {
            ProbeResult::Success { .. } => OutcomeKind::Success,
            ProbeResult::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind() == OutcomeKind::Success
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.result {
            ProbeResult::Success { status_code, .. } => Some(status_code),
            ProbeResult::Error { .. } => None,
        }
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        match self.result {
            ProbeResult::Success {
                response_time_ms, ..
            } => Some(response_time_ms),
            ProbeResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.result {
            ProbeResult::Error { error } => Some(error),
            ProbeResult::Success { .. } => None,
        }
    }
}

/// Performs a single health-check request.
///
/// Implementations must never fail: every transport problem is folded into an
/// error outcome so one target can't abort a cycle.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}
