//! Failure Injection for the Mock Metadata Service
//!
//! Supports configurable failure injection for testing error paths, per
//! operation or per (operation, record id).

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Operations of the mock service that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    ListDefinitions,
    GetDefinition,
    ListVersions,
    FetchPayload,
    DeleteVersion,
    CreateDefinition,
    CreateVersion,
    OrgContext,
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error to return (if any)
    pub error: Option<ClientError>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Return `error` on every call
    pub fn error(error: ClientError) -> Self {
        Self {
            error: Some(error),
            delay: None,
            fail_count: None,
        }
    }

    /// Return an HTTP error with a service error body
    pub fn http(status: u16, code: &str, message: &str) -> Self {
        let body = serde_json::json!([{ "message": message, "errorCode": code, "fields": [] }]);
        Self::error(ClientError::Transport {
            status,
            body: body.to_string(),
        })
    }

    /// Fail as if the service could not be reached
    pub fn unreachable() -> Self {
        Self::error(ClientError::Connection("connection refused".to_string()))
    }

    /// Only add delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            error: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FailureKey {
    Op(MockOp),
    Target(MockOp, String),
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<FailureKey, FailureConfig>,
    call_counts: HashMap<FailureKey, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for every call of an operation
    pub fn inject(&mut self, op: MockOp, config: FailureConfig) {
        self.insert(FailureKey::Op(op), config);
    }

    /// Inject a failure for one record id of an operation
    pub fn inject_for(&mut self, op: MockOp, target: impl Into<String>, config: FailureConfig) {
        self.insert(FailureKey::Target(op, target.into()), config);
    }

    fn insert(&mut self, key: FailureKey, config: FailureConfig) {
        self.call_counts.insert(key.clone(), 0);
        self.configs.insert(key, config);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Check whether a call should fail. Targeted injections win over
    /// operation-wide ones.
    pub fn check(&mut self, op: MockOp, target: Option<&str>) -> Option<FailureConfig> {
        let targeted = target.map(|t| FailureKey::Target(op, t.to_string()));
        let key = match targeted {
            Some(key) if self.configs.contains_key(&key) => key,
            _ => FailureKey::Op(op),
        };

        let config = self.configs.get(&key)?;
        let count = self.call_counts.entry(key).or_insert(0);
        *count += 1;

        if let Some(limit) = config.fail_count {
            if *count > limit {
                return None;
            }
        }

        Some(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_config_http() {
        let config = FailureConfig::http(500, "UNKNOWN_EXCEPTION", "boom");
        let err = config.error.unwrap();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "HTTP 500: UNKNOWN_EXCEPTION: boom");
    }

    #[test]
    fn test_injector_always_fail() {
        let mut injector = FailureInjector::new();
        injector.inject(MockOp::ListVersions, FailureConfig::unreachable());

        assert!(injector.check(MockOp::ListVersions, Some("300A")).is_some());
        assert!(injector.check(MockOp::ListVersions, None).is_some());
        assert!(injector.check(MockOp::DeleteVersion, None).is_none());
    }

    #[test]
    fn test_injector_targeted() {
        let mut injector = FailureInjector::new();
        injector.inject_for(MockOp::DeleteVersion, "301B", FailureConfig::unreachable());

        assert!(injector.check(MockOp::DeleteVersion, Some("301A")).is_none());
        assert!(injector.check(MockOp::DeleteVersion, Some("301B")).is_some());
        assert!(injector.check(MockOp::DeleteVersion, None).is_none());
    }

    #[test]
    fn test_injector_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject(MockOp::OrgContext, FailureConfig::unreachable().with_fail_count(2));

        assert!(injector.check(MockOp::OrgContext, None).is_some());
        assert!(injector.check(MockOp::OrgContext, None).is_some());
        assert!(injector.check(MockOp::OrgContext, None).is_none());
    }

    #[test]
    fn test_injector_clear() {
        let mut injector = FailureInjector::new();
        injector.inject(MockOp::CreateVersion, FailureConfig::unreachable());
        injector.clear();
        assert!(injector.check(MockOp::CreateVersion, None).is_none());
    }
}
