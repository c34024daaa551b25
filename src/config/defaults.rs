//! Built-in defaults (layer 1)

use flowvault_protocol::DEFAULT_API_VERSION;
use serde::{Deserialize, Serialize};

use crate::client::RetryPolicy;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// API version segment (default: "v52.0")
    pub api_version: String,

    /// Per-request timeout in seconds (default: 60)
    pub timeout_seconds: u64,

    /// Retries for idempotent calls (default: 3)
    pub max_retries: u32,

    /// First retry delay in milliseconds (default: 500)
    pub retry_initial_delay_ms: u64,

    /// Retry delay cap in milliseconds (default: 8000)
    pub retry_max_delay_ms: u64,

    /// Flows processed at once (default: 1)
    pub concurrency: usize,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_seconds: 60,
            max_retries: retry.max_retries,
            retry_initial_delay_ms: retry.initial_delay_ms,
            retry_max_delay_ms: retry.max_delay_ms,
            concurrency: 1,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "org": {
                "api_version": self.api_version
            },
            "client": {
                "timeout_seconds": self.timeout_seconds,
                "max_retries": self.max_retries,
                "retry_initial_delay_ms": self.retry_initial_delay_ms,
                "retry_max_delay_ms": self.retry_max_delay_ms
            },
            "batch": {
                "concurrency": self.concurrency
            }
        })
    }
}
