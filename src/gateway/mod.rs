use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod twilio;

/// Call lifecycle states as reported by the provider. Unknown strings are
/// preserved verbatim so new provider states never break status recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    Other(String),
}

impl CallStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => CallStatus::Queued,
            "ringing" => CallStatus::Ringing,
            "in-progress" => CallStatus::InProgress,
            "completed" => CallStatus::Completed,
            "busy" => CallStatus::Busy,
            "failed" => CallStatus::Failed,
            "no-answer" => CallStatus::NoAnswer,
            "canceled" => CallStatus::Canceled,
            other => CallStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Busy => "busy",
            CallStatus::Failed => "failed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Canceled => "canceled",
            CallStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for CallStatus {
    fn from(raw: String) -> Self {
        CallStatus::parse(&raw)
    }
}

impl From<CallStatus> for String {
    fn from(status: CallStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the provider needs to place one outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Callee, E.164.
    pub to: String,
    /// Caller id, E.164.
    pub from: String,
    /// Webhook the provider fetches for call instructions once answered.
    pub url: String,
    /// HTTP method for that fetch.
    pub method: String,
    /// Webhook receiving terminal delivery statuses.
    pub status_callback: String,
    /// Which lifecycle events the provider should report back.
    pub status_events: Vec<String>,
    /// Seconds to let the callee ring.
    pub timeout_secs: u32,
}

/// Provider acknowledgement of an accepted call.
#[derive(Debug, Clone)]
pub struct PlacedCall {
    pub sid: String,
    pub status: CallStatus,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("provider rejected the call ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("transport failure talking to the provider: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Seam between the campaign machinery and the telephony REST API, so the
/// dial loop can run against a mock in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    async fn place_call(&self, request: CallRequest) -> Result<PlacedCall, GatewayError>;
}
