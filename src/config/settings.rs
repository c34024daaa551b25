//! Typed settings, validated from the merged configuration

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::client::{RetryPolicy, ToolingClientConfig};

use super::defaults::BuiltinDefaults;
use super::effective::ConfigError;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct OrgSettings {
    pub instance_url: Option<String>,
    pub access_token: Option<String>,
    pub api_version: String,
}

impl Default for OrgSettings {
    fn default() -> Self {
        Self {
            instance_url: None,
            access_token: None,
            api_version: BuiltinDefaults::default().api_version,
        }
    }
}

impl fmt::Debug for OrgSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrgSettings")
            .field("instance_url", &self.instance_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            timeout_seconds: defaults.timeout_seconds,
            max_retries: defaults.max_retries,
            retry_initial_delay_ms: defaults.retry_initial_delay_ms,
            retry_max_delay_ms: defaults.retry_max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: BuiltinDefaults::default().concurrency,
        }
    }
}

/// Everything the commands need, unredacted. Passed explicitly; there is
/// no process-wide configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub org: OrgSettings,
    pub client: ClientSettings,
    pub batch: BatchSettings,
}

impl Settings {
    /// Deserialize and validate the merged configuration.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let settings = Self::deserialize(value).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        let version_ok = self
            .org
            .api_version
            .strip_prefix('v')
            .is_some_and(|n| n.parse::<f64>().is_ok());
        if !version_ok {
            return Err(ConfigError::ValidationError(format!(
                "org.api_version '{}' must look like v52.0",
                self.org.api_version
            )));
        }

        if let Some(url) = &self.org.instance_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return invalid("org.instance_url must be an http(s) URL");
            }
        }

        if self.client.timeout_seconds == 0 || self.client.timeout_seconds > 600 {
            return invalid("client.timeout_seconds must be in (0, 600]");
        }
        if self.client.retry_initial_delay_ms > self.client.retry_max_delay_ms {
            return invalid("client.retry_initial_delay_ms must not exceed client.retry_max_delay_ms");
        }
        if self.batch.concurrency == 0 || self.batch.concurrency > 64 {
            return invalid("batch.concurrency must be in [1, 64]");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.client.max_retries,
            initial_delay_ms: self.client.retry_initial_delay_ms,
            max_delay_ms: self.client.retry_max_delay_ms,
        }
    }

    /// Connection settings for the Tooling API client.
    pub fn client_config(&self) -> Result<ToolingClientConfig, ConfigError> {
        let instance_url = self
            .org
            .instance_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("org.instance_url"))?;
        let access_token = self
            .org
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("org.access_token (or FLOWVAULT_ACCESS_TOKEN)"))?;

        let mut config = ToolingClientConfig::new(instance_url.trim_end_matches('/'), access_token);
        config.api_version = self.org.api_version.clone();
        config.timeout_seconds = self.client.timeout_seconds;
        config.retry = self.retry_policy();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_config() {
        let settings = Settings::from_value(&json!({
            "org": {
                "instance_url": "https://acme.my.salesforce.com/",
                "access_token": "tok",
                "api_version": "v58.0"
            },
            "client": { "timeout_seconds": 30, "max_retries": 1 }
        }))
        .unwrap();

        let config = settings.client_config().unwrap();
        assert_eq!(config.instance_url, "https://acme.my.salesforce.com");
        assert_eq!(config.api_version, "v58.0");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn test_missing_connection_settings() {
        let settings = Settings::from_value(&json!({})).unwrap();
        assert!(matches!(
            settings.client_config(),
            Err(ConfigError::Missing("org.instance_url"))
        ));

        let settings = Settings::from_value(&json!({ "org": { "instance_url": "https://x" } })).unwrap();
        assert!(matches!(settings.client_config(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_validation() {
        assert!(Settings::from_value(&json!({ "org": { "api_version": "52" } })).is_err());
        assert!(Settings::from_value(&json!({ "org": { "instance_url": "acme" } })).is_err());
        assert!(Settings::from_value(&json!({ "client": { "timeout_seconds": 0 } })).is_err());
        assert!(Settings::from_value(&json!({
            "client": { "retry_initial_delay_ms": 9000, "retry_max_delay_ms": 100 }
        }))
        .is_err());
        assert!(Settings::from_value(&json!({ "client": { "max_retries": "three" } })).is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let settings = Settings::from_value(&json!({ "org": { "access_token": "hunter2" } })).unwrap();
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }
}
