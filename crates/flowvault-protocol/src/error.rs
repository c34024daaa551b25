//! Error bodies returned by the service.
//!
//! Failed calls answer with a JSON array such as
//! `[{"message": "...", "errorCode": "DELETE_FAILED", "fields": []}]`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes the client reacts to. Anything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceErrorCode {
    /// Deletion refused; raised when deleting the active flow version.
    DeleteFailed,
    /// The record was already deleted.
    EntityIsDeleted,
    /// The record does not exist.
    NotFound,
    /// Session expired or token rejected.
    InvalidSessionId,
    /// API request limit hit.
    RequestLimitExceeded,
    Other(String),
}

impl ServiceErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "DELETE_FAILED" => Self::DeleteFailed,
            "ENTITY_IS_DELETED" => Self::EntityIsDeleted,
            "NOT_FOUND" => Self::NotFound,
            "INVALID_SESSION_ID" => Self::InvalidSessionId,
            "REQUEST_LIMIT_EXCEEDED" => Self::RequestLimitExceeded,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DeleteFailed => "DELETE_FAILED",
            Self::EntityIsDeleted => "ENTITY_IS_DELETED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidSessionId => "INVALID_SESSION_ID",
            Self::RequestLimitExceeded => "REQUEST_LIMIT_EXCEEDED",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ServiceError {
    pub fn code(&self) -> ServiceErrorCode {
        ServiceErrorCode::parse(&self.error_code)
    }

    /// Parse an error body. Bodies that are not the expected shape yield no entries.
    pub fn parse_body(body: &str) -> Vec<ServiceError> {
        serde_json::from_str::<Vec<ServiceError>>(body)
            .or_else(|_| serde_json::from_str::<ServiceError>(body).map(|e| vec![e]))
            .unwrap_or_default()
    }

    /// Whether any entry of `body` carries `code`.
    ///
    /// Falls back to a substring match for bodies that are not JSON.
    pub fn body_has_code(body: &str, code: &ServiceErrorCode) -> bool {
        let parsed = Self::parse_body(body);
        if parsed.is_empty() {
            return body.contains(code.as_str());
        }
        parsed.iter().any(|e| &e.code() == code)
    }

    /// First message in the body, or the raw body.
    pub fn summarize(body: &str) -> String {
        match Self::parse_body(body).first() {
            Some(e) if !e.error_code.is_empty() => format!("{}: {}", e.error_code, e.message),
            Some(e) => e.message.clone(),
            None => body.trim().to_string(),
        }
    }
}
