//! Client error taxonomy.

use flowvault_protocol::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The service answered with a non-2xx status.
    #[error("HTTP {status}: {}", ServiceError::summarize(.body))]
    Transport { status: u16, body: String },

    /// The service could not be reached at all.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A 2xx response whose body could not be understood.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// HTTP status, when the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures worth retrying for idempotent calls.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { status, .. } => *status == 429 || *status >= 500,
            ClientError::Connection(_) => true,
            ClientError::Decode(_) => false,
        }
    }

    /// Network-level failure (no HTTP exchange happened).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Why the service refused a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefusalReason {
    /// The version is the one currently serving traffic.
    ActiveVersion,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefusalReason::ActiveVersion => write!(f, "active-version"),
        }
    }
}

/// Non-error outcomes of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Refused(RefusalReason),
    /// Already gone; deleting twice is not an error.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_uses_service_message() {
        let err = ClientError::Transport {
            status: 500,
            body: r#"[{"message":"boom","errorCode":"UNKNOWN_EXCEPTION"}]"#.to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: UNKNOWN_EXCEPTION: boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_retryable() {
        let status = |s| ClientError::Transport { status: s, body: String::new() };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(ClientError::Connection("reset".into()).is_retryable());
        assert!(!ClientError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn test_refusal_display() {
        assert_eq!(RefusalReason::ActiveVersion.to_string(), "active-version");
    }
}
