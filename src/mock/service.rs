//! Mock Metadata Service
//!
//! In-memory implementation of [`MetadataClient`] for tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use flowvault_protocol::{
    ArtifactDefinition, ArtifactVersion, DefinitionSpec, OrgContext, VersionSpec,
};
use serde_json::{json, Map, Value};

use crate::client::{ClientError, ClientResult, DeleteOutcome, MetadataClient, VersionPayload};

use super::failure::{FailureConfig, FailureInjector, MockOp};
use super::state::{MockCall, MockState};

/// Configurable in-memory metadata service.
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// inspection while an engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockMetadataService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl MockMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service reporting `org` as its organization
    pub fn with_org(org: OrgContext) -> Self {
        let service = Self::new();
        service.state().org = org;
        service
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failures(&self) -> MutexGuard<'_, FailureInjector> {
        self.failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Seeding ===

    /// Add a flow with versions `1..=version_count`, activating
    /// `active` if given. Returns the definition id.
    pub fn add_flow(&self, developer_name: &str, version_count: u32, active: Option<u32>) -> String {
        let mut state = self.state();
        let definition_id = match state.insert_definition(developer_name, "") {
            Some(id) => id,
            None => return String::new(),
        };
        for number in 1..=version_count {
            let status = if active == Some(number) { "Active" } else { "Inactive" };
            state.insert_version(&definition_id, Some(number), sample_fields(developer_name, number, status));
        }
        definition_id
    }

    /// Append a new inactive version. Returns its id.
    pub fn add_version(&self, definition_id: &str) -> Option<String> {
        let mut state = self.state();
        let name = state.definition(definition_id)?.definition.developer_name.clone();
        let number = state
            .definition(definition_id)?
            .versions
            .keys()
            .next_back()
            .map_or(1, |n| n + 1);
        state.insert_version(definition_id, Some(number), sample_fields(&name, number, "Inactive"))
    }

    /// Activate a version by number, or deactivate the flow with `None`.
    pub fn set_active(&self, definition_id: &str, version_number: Option<u32>) -> bool {
        self.state().set_active(definition_id, version_number)
    }

    /// Point the definition's active id at an arbitrary id, as a stale or
    /// inconsistent service would.
    pub fn set_active_version_id(&self, definition_id: &str, version_id: Option<&str>) {
        if let Some(stored) = self.state().definition_mut(definition_id) {
            stored.definition.active_version_id = version_id.map(str::to_string);
        }
    }

    // === Failure injection ===

    pub fn inject_failure(&self, op: MockOp, config: FailureConfig) {
        self.failures().inject(op, config);
    }

    /// Fail `op` only when it targets `target` (a record id or developer name)
    pub fn inject_failure_for(&self, op: MockOp, target: &str, config: FailureConfig) {
        self.failures().inject_for(op, target, config);
    }

    pub fn clear_failures(&self) {
        self.failures().clear();
    }

    // === Inspection ===

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls().to_vec()
    }

    /// Targets of every call of one operation, in call order
    pub fn calls_for(&self, op: MockOp) -> Vec<String> {
        self.state()
            .calls()
            .iter()
            .filter(|c| c.op == op)
            .filter_map(|c| c.target.clone())
            .collect()
    }

    pub fn definition_by_name(&self, developer_name: &str) -> Option<ArtifactDefinition> {
        self.state()
            .find_by_name(developer_name)
            .map(|d| d.definition.clone())
    }

    /// Versions of a definition, ascending
    pub fn versions_of(&self, definition_id: &str) -> Vec<ArtifactVersion> {
        self.state()
            .definition(definition_id)
            .map(|d| d.versions.values().map(|v| v.version.clone()).collect())
            .unwrap_or_default()
    }

    /// Id of version `version_number` of the named flow
    pub fn version_id(&self, developer_name: &str, version_number: u32) -> Option<String> {
        self.state()
            .find_by_name(developer_name)
            .and_then(|d| d.versions.get(&version_number))
            .map(|v| v.version.id.clone())
    }

    pub fn payload(&self, version_id: &str) -> Option<VersionPayload> {
        self.state().find_version(version_id).map(|v| v.payload.clone())
    }

    /// Set one payload field of a version
    pub fn set_payload_field(&self, version_id: &str, key: &str, value: Value) {
        let mut state = self.state();
        let ids: Vec<String> = state.definitions().map(|d| d.definition.id.clone()).collect();
        for id in ids {
            if let Some(stored) = state.definition_mut(&id) {
                if let Some(v) = stored.versions.values_mut().find(|v| v.version.id == version_id) {
                    v.payload.insert(key.to_string(), value);
                    return;
                }
            }
        }
    }

    /// Record the call, then apply any injected delay or error.
    fn enter(&self, op: MockOp, target: Option<&str>) -> ClientResult<()> {
        self.state().record_call(op, target);
        let failure = self.failures().check(op, target);
        if let Some(config) = failure {
            if let Some(delay) = config.delay {
                thread::sleep(delay);
            }
            if let Some(error) = config.error {
                return Err(error);
            }
        }
        Ok(())
    }
}

impl MetadataClient for MockMetadataService {
    fn list_definitions(&self) -> ClientResult<Vec<ArtifactDefinition>> {
        self.enter(MockOp::ListDefinitions, None)?;
        Ok(self.state().definitions().map(|d| d.definition.clone()).collect())
    }

    fn get_definition(&self, developer_name: &str) -> ClientResult<Option<ArtifactDefinition>> {
        self.enter(MockOp::GetDefinition, Some(developer_name))?;
        Ok(self.definition_by_name(developer_name))
    }

    fn get_definition_by_id(&self, definition_id: &str) -> ClientResult<Option<ArtifactDefinition>> {
        self.enter(MockOp::GetDefinition, Some(definition_id))?;
        Ok(self.state().definition(definition_id).map(|d| d.definition.clone()))
    }

    fn list_versions(&self, definition_id: &str) -> ClientResult<Vec<ArtifactVersion>> {
        self.enter(MockOp::ListVersions, Some(definition_id))?;
        Ok(self.versions_of(definition_id))
    }

    fn fetch_version_payload(&self, version_id: &str) -> ClientResult<Option<VersionPayload>> {
        self.enter(MockOp::FetchPayload, Some(version_id))?;
        Ok(self.payload(version_id))
    }

    fn delete_version(&self, version_id: &str) -> ClientResult<DeleteOutcome> {
        self.enter(MockOp::DeleteVersion, Some(version_id))?;
        Ok(self.state().delete_version(version_id))
    }

    fn create_definition(&self, spec: &DefinitionSpec) -> ClientResult<String> {
        self.enter(MockOp::CreateDefinition, Some(&spec.developer_name))?;
        self.state()
            .insert_definition(&spec.developer_name, &spec.description)
            .ok_or_else(|| duplicate("DUPLICATE_DEVELOPER_NAME", &spec.developer_name))
    }

    fn create_version(&self, spec: &VersionSpec) -> ClientResult<String> {
        self.enter(MockOp::CreateVersion, Some(&spec.definition_id))?;

        let mut fields = Map::new();
        fields.insert("Status".to_string(), json!(spec.status.to_string()));
        fields.insert("Description".to_string(), json!(spec.description));
        if let Some(api_version) = &spec.api_version {
            fields.insert("ApiVersion".to_string(), api_version.clone());
        }
        if let Some(process_type) = &spec.process_type {
            fields.insert("ProcessType".to_string(), json!(process_type));
        }
        if let Some(full_name) = &spec.full_name {
            fields.insert("FullName".to_string(), json!(full_name));
        }
        if let Some(metadata) = &spec.metadata {
            fields.insert("Metadata".to_string(), metadata.clone());
        }

        let mut state = self.state();
        if state.definition(&spec.definition_id).is_none() {
            return Err(ClientError::Transport {
                status: 400,
                body: json!([{
                    "message": format!("invalid cross reference id: {}", spec.definition_id),
                    "errorCode": "INVALID_CROSS_REFERENCE_KEY",
                }])
                .to_string(),
            });
        }
        state
            .insert_version(&spec.definition_id, Some(spec.version_number), fields)
            .ok_or_else(|| duplicate("DUPLICATE_VALUE", &spec.version_number.to_string()))
    }

    fn get_org_context(&self) -> ClientResult<OrgContext> {
        self.enter(MockOp::OrgContext, None)?;
        Ok(self.state().org.clone())
    }
}

fn duplicate(code: &str, what: &str) -> ClientError {
    ClientError::Transport {
        status: 400,
        body: json!([{ "message": format!("duplicate value found: {}", what), "errorCode": code }])
            .to_string(),
    }
}

/// Payload fields of a seeded version.
fn sample_fields(developer_name: &str, version_number: u32, status: &str) -> VersionPayload {
    let metadata = json!({
        "label": developer_name.replace('_', " "),
        "processType": "AutoLaunchedFlow",
        "status": status,
        "interviewLabel": format!("{} {{!$Flow.CurrentDateTime}}", developer_name),
        "runInMode": null,
        "processMetadataValues": [
            { "name": "BuilderType", "value": { "stringValue": "LightningFlowBuilder" } },
            { "name": "OriginBuilderType", "value": { "stringValue": "LightningFlowBuilder" } }
        ],
        "start": {
            "locationX": 50,
            "locationY": 0,
            "triggerType": null
        },
        "variables": [
            { "name": "recordId", "dataType": "String", "isInput": true, "isOutput": false }
        ]
    });

    let mut fields = Map::new();
    fields.insert("ApiVersion".to_string(), json!(52.0));
    fields.insert("Description".to_string(), json!(format!("{} v{}", developer_name, version_number)));
    fields.insert("FullName".to_string(), json!(format!("{}-{}", developer_name, version_number)));
    fields.insert("Metadata".to_string(), metadata);
    fields.insert("ProcessType".to_string(), json!("AutoLaunchedFlow"));
    fields.insert("Status".to_string(), json!(status));
    fields
}
