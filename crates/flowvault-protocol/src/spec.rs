//! Create payloads used when rebuilding a flow from a bundle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status a restored version is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    Active,
    Inactive,
}

impl VersionStatus {
    /// `Active` iff `version_number` is the declared active version.
    pub fn for_version(version_number: u32, active_version_number: Option<u32>) -> Self {
        if active_version_number == Some(version_number) {
            VersionStatus::Active
        } else {
            VersionStatus::Inactive
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionStatus::Active => write!(f, "Active"),
            VersionStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Body of `POST .../tooling/sobjects/FlowDefinition/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefinitionSpec {
    pub developer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_version_number: Option<u32>,
    #[serde(default)]
    pub description: String,
}

/// Body of `POST .../tooling/sobjects/Flow/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionSpec {
    pub definition_id: String,
    pub version_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<serde_json::Value>,
    pub status: VersionStatus,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response to a create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

fn default_success() -> bool {
    true
}
