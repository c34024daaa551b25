//! Query envelopes and SOQL builders.

use serde::{Deserialize, Serialize};

/// Paged query response.
///
/// When `done` is false, `next_records_url` points at the next page
/// (relative to the instance URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

const DEFINITION_FIELDS: &str = "Id, DeveloperName, LatestVersionId, ActiveVersionId, \
ActiveVersion.VersionNumber, LatestVersion.VersionNumber, LastModifiedDate, Description";

/// Quote a string literal for a SOQL `WHERE` clause.
pub fn soql_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// All flow definitions.
pub fn list_definitions_soql() -> String {
    format!("SELECT {} FROM FlowDefinition", DEFINITION_FIELDS)
}

/// One flow definition by developer name.
pub fn definition_by_name_soql(developer_name: &str) -> String {
    format!(
        "SELECT {} FROM FlowDefinition WHERE DeveloperName = {}",
        DEFINITION_FIELDS,
        soql_quote(developer_name)
    )
}

/// One flow definition by id.
pub fn definition_by_id_soql(definition_id: &str) -> String {
    format!(
        "SELECT {} FROM FlowDefinition WHERE Id = {}",
        DEFINITION_FIELDS,
        soql_quote(definition_id)
    )
}

/// All versions of a definition in ascending version order.
pub fn versions_soql(definition_id: &str) -> String {
    format!(
        "SELECT Id, ApiVersion, VersionNumber, DefinitionId, Status FROM Flow \
         WHERE DefinitionId = {} ORDER BY VersionNumber ASC",
        soql_quote(definition_id)
    )
}

/// Identity of the connected org.
pub const ORGANIZATION_SOQL: &str = "SELECT Id, Name, IsSandbox, OrganizationType FROM Organization";
