//! Report entries shared by every batch report

use std::fmt;

use serde::{Deserialize, Serialize};

/// A failure reason keyed to a version, or to the whole flow when
/// `version_number` is absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<u32>,
    pub reason: String,
}

impl FailureReason {
    pub fn flow(reason: impl Into<String>) -> Self {
        Self {
            version_number: None,
            reason: reason.into(),
        }
    }

    pub fn version(version_number: u32, reason: impl Into<String>) -> Self {
        Self {
            version_number: Some(version_number),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version_number {
            Some(n) => write!(f, "v{}: {}", n, self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// A flow with at least one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedArtifact {
    pub name: String,
    pub reasons: Vec<FailureReason>,
}

/// A skip, at flow or version level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_number: Option<u32>,
    pub reason: String,
}
