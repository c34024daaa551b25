//! Flow version records.

use serde::{Deserialize, Serialize};

/// Flow row as returned by a tooling query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowRow {
    pub id: String,
    pub definition_id: String,
    pub version_number: u32,
    #[serde(default)]
    pub api_version: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One immutable snapshot of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub id: String,
    pub definition_id: String,
    /// Positive, unique within a definition, assigned by the service.
    pub version_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<f64>,
    /// Status as reported by the service (`Active`, `Obsolete`, `Draft`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ArtifactVersion {
    pub fn new(id: impl Into<String>, definition_id: impl Into<String>, version_number: u32) -> Self {
        Self {
            id: id.into(),
            definition_id: definition_id.into(),
            version_number,
            api_version: None,
            status: None,
        }
    }
}

impl From<FlowRow> for ArtifactVersion {
    fn from(row: FlowRow) -> Self {
        Self {
            id: row.id,
            definition_id: row.definition_id,
            version_number: row.version_number,
            api_version: row.api_version,
            status: row.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_row_deserialization() {
        let json = r#"{
            "attributes": {"type": "Flow"},
            "Id": "301xx0000000001AAA",
            "ApiVersion": 52.0,
            "VersionNumber": 4,
            "DefinitionId": "300xx0000000001AAA",
            "Status": "Obsolete"
        }"#;
        let version = ArtifactVersion::from(serde_json::from_str::<FlowRow>(json).unwrap());

        assert_eq!(version.version_number, 4);
        assert_eq!(version.api_version, Some(52.0));
        assert_eq!(version.status.as_deref(), Some("Obsolete"));
    }
}
