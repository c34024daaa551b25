//! Mock Service State Management
//!
//! Definitions, versions and payloads held by the mock metadata service,
//! with the server-side rules the engines rely on: the active version
//! cannot be deleted, and latest/active pointers follow the version set.

use std::collections::BTreeMap;

use flowvault_protocol::{ArtifactDefinition, ArtifactVersion, OrgContext};
use serde_json::{json, Value};

use crate::client::{DeleteOutcome, RefusalReason, VersionPayload};

use super::failure::MockOp;

/// FlowDefinition key prefix
pub const DEFINITION_KEY_PREFIX: &str = "300";
/// Flow key prefix
pub const VERSION_KEY_PREFIX: &str = "301";

/// One call made against the mock service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub op: MockOp,
    /// Record id or developer name the call was about
    pub target: Option<String>,
}

/// A stored version and its full payload
#[derive(Debug, Clone)]
pub struct StoredVersion {
    pub version: ArtifactVersion,
    pub payload: VersionPayload,
}

/// A stored definition and its versions keyed by version number
#[derive(Debug, Clone)]
pub struct StoredDefinition {
    pub definition: ArtifactDefinition,
    pub versions: BTreeMap<u32, StoredVersion>,
}

impl StoredDefinition {
    /// Recompute the latest/active pointers and version statuses.
    fn refresh(&mut self) {
        let latest = self.versions.values().next_back().map(|v| v.version.clone());
        self.definition.latest_version_id = latest.as_ref().map(|v| v.id.clone());
        self.definition.latest_version_number = latest.as_ref().map(|v| v.version_number);

        let active_number = self
            .definition
            .active_version_number
            .filter(|n| self.versions.contains_key(n));
        self.definition.active_version_number = active_number;
        self.definition.active_version_id =
            active_number.and_then(|n| self.versions.get(&n)).map(|v| v.version.id.clone());

        for (number, stored) in self.versions.iter_mut() {
            let status = if Some(*number) == active_number {
                "Active"
            } else if stored.version.status.as_deref() == Some("Active") {
                "Inactive"
            } else {
                continue;
            };
            stored.version.status = Some(status.to_string());
            stored.payload.insert("Status".to_string(), Value::String(status.to_string()));
        }
    }
}

/// Mock service state
#[derive(Debug)]
pub struct MockState {
    pub org: OrgContext,
    definitions: BTreeMap<String, StoredDefinition>,
    calls: Vec<MockCall>,
    id_counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    pub fn new() -> Self {
        Self {
            org: OrgContext {
                id: "00D000000000001AAA".to_string(),
                name: "Acme".to_string(),
                is_sandbox: true,
                org_type: "Developer Edition".to_string(),
            },
            definitions: BTreeMap::new(),
            calls: Vec::new(),
            id_counter: 0,
        }
    }

    /// Generate an 18-character record id with a key prefix
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        format!("{}{:015}", prefix, self.id_counter)
    }

    pub fn record_call(&mut self, op: MockOp, target: Option<&str>) {
        self.calls.push(MockCall {
            op,
            target: target.map(str::to_string),
        });
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    pub fn definitions(&self) -> impl Iterator<Item = &StoredDefinition> {
        self.definitions.values()
    }

    pub fn definition(&self, definition_id: &str) -> Option<&StoredDefinition> {
        self.definitions.get(definition_id)
    }

    pub fn definition_mut(&mut self, definition_id: &str) -> Option<&mut StoredDefinition> {
        self.definitions.get_mut(definition_id)
    }

    pub fn find_by_name(&self, developer_name: &str) -> Option<&StoredDefinition> {
        self.definitions
            .values()
            .find(|d| d.definition.developer_name == developer_name)
    }

    /// Find a version by id
    pub fn find_version(&self, version_id: &str) -> Option<&StoredVersion> {
        self.definitions
            .values()
            .flat_map(|d| d.versions.values())
            .find(|v| v.version.id == version_id)
    }

    /// Insert a definition with no versions. Returns `None` if the
    /// developer name is taken.
    pub fn insert_definition(&mut self, developer_name: &str, description: &str) -> Option<String> {
        if self.find_by_name(developer_name).is_some() {
            return None;
        }
        let id = self.next_id(DEFINITION_KEY_PREFIX);
        let mut definition = ArtifactDefinition::new(&id, developer_name);
        if !description.is_empty() {
            definition.description = Some(description.to_string());
        }
        self.definitions.insert(
            id.clone(),
            StoredDefinition {
                definition,
                versions: BTreeMap::new(),
            },
        );
        Some(id)
    }

    /// Insert a version built from `fields` (payload fields other than the
    /// server-assigned ones). `version_number` defaults to the next number.
    /// Returns `None` if the definition is unknown or the number is taken.
    pub fn insert_version(
        &mut self,
        definition_id: &str,
        version_number: Option<u32>,
        mut fields: VersionPayload,
    ) -> Option<String> {
        let number = {
            let stored = self.definitions.get(definition_id)?;
            let next = stored.versions.keys().next_back().map_or(1, |n| n + 1);
            let number = version_number.unwrap_or(next);
            if stored.versions.contains_key(&number) {
                return None;
            }
            number
        };

        let id = self.next_id(VERSION_KEY_PREFIX);
        let status = fields
            .get("Status")
            .and_then(Value::as_str)
            .map(str::to_string);
        fields.insert("Id".to_string(), json!(id));
        fields.insert("DefinitionId".to_string(), json!(definition_id));
        fields.insert("VersionNumber".to_string(), json!(number));
        fields.insert(
            "attributes".to_string(),
            json!({ "type": "Flow", "url": format!("/services/data/v52.0/tooling/sobjects/Flow/{}", id) }),
        );

        let mut version = ArtifactVersion::new(&id, definition_id, number);
        version.api_version = fields.get("ApiVersion").and_then(Value::as_f64);
        version.status = status.clone();

        let stored = self.definitions.get_mut(definition_id)?;
        stored.versions.insert(number, StoredVersion { version, payload: fields });
        if status.as_deref() == Some("Active") {
            stored.definition.active_version_number = Some(number);
        }
        stored.refresh();
        Some(id)
    }

    /// Activate a version by number, or deactivate with `None`.
    pub fn set_active(&mut self, definition_id: &str, version_number: Option<u32>) -> bool {
        match self.definitions.get_mut(definition_id) {
            Some(stored) => {
                if let Some(n) = version_number {
                    if !stored.versions.contains_key(&n) {
                        return false;
                    }
                }
                for stored_version in stored.versions.values_mut() {
                    if stored_version.version.status.as_deref() == Some("Active") {
                        stored_version.version.status = Some("Inactive".to_string());
                        stored_version
                            .payload
                            .insert("Status".to_string(), json!("Inactive"));
                    }
                }
                stored.definition.active_version_number = version_number;
                stored.refresh();
                true
            }
            None => false,
        }
    }

    /// Delete a version, refusing the active one.
    pub fn delete_version(&mut self, version_id: &str) -> DeleteOutcome {
        for stored in self.definitions.values_mut() {
            let found = stored
                .versions
                .iter()
                .find(|(_, v)| v.version.id == version_id)
                .map(|(n, _)| *n);
            if let Some(number) = found {
                if stored.definition.active_version_id.as_deref() == Some(version_id) {
                    return DeleteOutcome::Refused(RefusalReason::ActiveVersion);
                }
                stored.versions.remove(&number);
                stored.refresh();
                return DeleteOutcome::Deleted;
            }
        }
        DeleteOutcome::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn fields(status: &str) -> VersionPayload {
        let mut map = Map::new();
        map.insert("Status".to_string(), json!(status));
        map.insert("ApiVersion".to_string(), json!(52.0));
        map
    }

    #[test]
    fn test_ids_are_18_chars_with_prefix() {
        let mut state = MockState::new();
        let id = state.next_id(DEFINITION_KEY_PREFIX);
        assert_eq!(id.len(), 18);
        assert!(id.starts_with("300"));
        assert_ne!(id, state.next_id(DEFINITION_KEY_PREFIX));
    }

    #[test]
    fn test_duplicate_developer_name_rejected() {
        let mut state = MockState::new();
        assert!(state.insert_definition("Order_Flow", "").is_some());
        assert!(state.insert_definition("Order_Flow", "").is_none());
    }

    #[test]
    fn test_pointers_follow_versions() {
        let mut state = MockState::new();
        let def = state.insert_definition("Order_Flow", "").unwrap();
        let v1 = state.insert_version(&def, None, fields("Active")).unwrap();
        let v2 = state.insert_version(&def, None, fields("Inactive")).unwrap();

        let d = &state.definition(&def).unwrap().definition;
        assert_eq!(d.latest_version_id.as_deref(), Some(v2.as_str()));
        assert_eq!(d.latest_version_number, Some(2));
        assert_eq!(d.active_version_id.as_deref(), Some(v1.as_str()));

        assert!(state.set_active(&def, Some(2)));
        let d = state.definition(&def).unwrap();
        assert_eq!(d.definition.active_version_id.as_deref(), Some(v2.as_str()));
        assert_eq!(d.versions[&1].version.status.as_deref(), Some("Inactive"));
        assert_eq!(d.versions[&2].payload["Status"], json!("Active"));
    }

    #[test]
    fn test_delete_rules() {
        let mut state = MockState::new();
        let def = state.insert_definition("Order_Flow", "").unwrap();
        let v1 = state.insert_version(&def, None, fields("Inactive")).unwrap();
        let v2 = state.insert_version(&def, None, fields("Active")).unwrap();

        assert_eq!(
            state.delete_version(&v2),
            DeleteOutcome::Refused(RefusalReason::ActiveVersion)
        );
        assert_eq!(state.delete_version(&v1), DeleteOutcome::Deleted);
        assert_eq!(state.delete_version(&v1), DeleteOutcome::NotFound);
        assert_eq!(state.definition(&def).unwrap().versions.len(), 1);
    }

    #[test]
    fn test_explicit_version_number_conflict() {
        let mut state = MockState::new();
        let def = state.insert_definition("Order_Flow", "").unwrap();
        assert!(state.insert_version(&def, Some(3), fields("Inactive")).is_some());
        assert!(state.insert_version(&def, Some(3), fields("Inactive")).is_none());
        assert!(state.insert_version("300missing", None, fields("Inactive")).is_none());
    }
}
