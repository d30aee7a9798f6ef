use serde_json::Value;
use thiserror::Error;

use crate::util::compact_text;

pub const DEFAULT_ERROR_MESSAGE: &str = "An API error occurred";

/// Status reported for requests that never produced a response
pub const TRANSPORT_STATUS: u16 = 0;
/// Status reported when the client gave up waiting
pub const TIMEOUT_STATUS: u16 = 408;
pub const UNAUTHORIZED_STATUS: u16 = 401;

/// Failure of a single API call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network timeout")]
    Timeout,
    #[error("Network error: {0}")]
    Transport(String),
    #[error("{message} (HTTP {status})")]
    Http {
        status: u16,
        message: String,
        raw_body: Value,
    },
}

/// How a failure should be treated by callers that replay work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Transport,
    Unauthorized,
    /// 4xx other than 401 and 408: the request itself is wrong
    Client,
    /// 5xx and anything else the server answered with
    Server,
}

impl ErrorClass {
    /// Failures worth trying again later without changing the request
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Transport | Self::Server)
    }
}

impl ApiError {
    /// Build from a non-success response body. The server's `message` is used
    /// when the body is a JSON object carrying one.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let raw_body = serde_json::from_slice::<Value>(body).unwrap_or_else(|_| {
            tracing::debug!(
                status,
                body = %compact_text(&String::from_utf8_lossy(body)),
                "Error response body is not JSON"
            );
            Value::Object(serde_json::Map::new())
        });
        let message = raw_body
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string();
        Self::Http {
            status,
            message,
            raw_body,
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }

    /// Numeric status: 0 for transport failures, 408 for timeouts
    pub const fn status(&self) -> u16 {
        match self {
            Self::Timeout => TIMEOUT_STATUS,
            Self::Transport(_) => TRANSPORT_STATUS,
            Self::Http { status, .. } => *status,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub const fn raw_body(&self) -> Option<&Value> {
        match self {
            Self::Http { raw_body, .. } => Some(raw_body),
            _ => None,
        }
    }

    pub const fn class(&self) -> ErrorClass {
        match self.status() {
            TRANSPORT_STATUS => ErrorClass::Transport,
            TIMEOUT_STATUS => ErrorClass::Timeout,
            UNAUTHORIZED_STATUS => ErrorClass::Unauthorized,
            400..=499 => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }

    pub const fn is_unauthorized(&self) -> bool {
        self.status() == UNAUTHORIZED_STATUS
    }
}
