//! Flow definition records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nested `{"VersionNumber": n}` reference used for `ActiveVersion` and `LatestVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    #[serde(rename = "VersionNumber")]
    pub version_number: u32,
}

/// FlowDefinition row as returned by a tooling query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlowDefinitionRow {
    pub id: String,
    pub developer_name: String,
    #[serde(default)]
    pub latest_version_id: Option<String>,
    #[serde(default)]
    pub active_version_id: Option<String>,
    #[serde(default)]
    pub latest_version: Option<VersionRef>,
    #[serde(default)]
    pub active_version: Option<VersionRef>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One named flow and the pointers to its latest and active versions.
///
/// This is a read-only local copy; the service owns the record and the
/// copy may be stale by the time it is acted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    pub id: String,
    pub developer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArtifactDefinition {
    /// Create a definition with no versions yet.
    pub fn new(id: impl Into<String>, developer_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            developer_name: developer_name.into(),
            latest_version_id: None,
            active_version_id: None,
            latest_version_number: None,
            active_version_number: None,
            last_modified: None,
            description: None,
        }
    }

    /// Whether any version is currently active.
    pub fn has_active(&self) -> bool {
        self.active_version_id.is_some()
    }

    /// Whether `version_id` is the active version.
    pub fn is_active_version(&self, version_id: &str) -> bool {
        self.active_version_id.as_deref() == Some(version_id)
    }

    /// Whether `version_id` is the latest version.
    pub fn is_latest_version(&self, version_id: &str) -> bool {
        self.latest_version_id.as_deref() == Some(version_id)
    }
}

impl From<FlowDefinitionRow> for ArtifactDefinition {
    fn from(row: FlowDefinitionRow) -> Self {
        Self {
            id: row.id,
            developer_name: row.developer_name,
            latest_version_id: non_empty(row.latest_version_id),
            active_version_id: non_empty(row.active_version_id),
            latest_version_number: row.latest_version.map(|v| v.version_number),
            active_version_number: row.active_version.map(|v| v.version_number),
            last_modified: row.last_modified_date.as_deref().and_then(parse_timestamp),
            description: non_empty(row.description),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse a service timestamp.
///
/// The service emits `2024-03-01T12:34:56.000+0000`, which is not strict
/// RFC 3339 (no colon in the offset), so both forms are accepted.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
