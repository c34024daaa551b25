//! Identifier-to-state index.
//!
//! Presentation layers read lifecycle state from here by definition id
//! instead of carrying it on their own widgets or rows.

use std::collections::BTreeMap;

use flowvault_protocol::ArtifactDefinition;
use serde::{Deserialize, Serialize};

use crate::result::{Classification, DataConsistencyWarning};
use crate::{has_active_lower_version, is_stale};

/// Artifact-level state of one definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionStatus {
    pub definition_id: String,
    pub developer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version_number: Option<u32>,
    pub has_active: bool,
    pub is_stale: bool,
    pub active_lower_version: bool,
    /// Set once versions have been listed and classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<DataConsistencyWarning>,
}

impl DefinitionStatus {
    /// Status derivable from the definition record alone.
    pub fn from_definition(definition: &ArtifactDefinition) -> Self {
        Self {
            definition_id: definition.id.clone(),
            developer_name: definition.developer_name.clone(),
            latest_version_number: definition.latest_version_number,
            active_version_number: definition.active_version_number,
            has_active: definition.has_active(),
            is_stale: is_stale(definition),
            active_lower_version: has_active_lower_version(definition),
            version_count: None,
            warning: None,
        }
    }
}

/// Filter for listing definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleFilter {
    #[default]
    All,
    /// The latest version is the active one.
    Active,
    /// The latest version is not active (includes never activated).
    Inactive,
    /// An older version is active while newer ones exist.
    ActiveLowerVersion,
    /// Never activated at all.
    Stale,
}

impl LifecycleFilter {
    pub fn matches(&self, status: &DefinitionStatus) -> bool {
        match self {
            LifecycleFilter::All => true,
            LifecycleFilter::Active => status.has_active && !status.is_stale,
            LifecycleFilter::Inactive => status.is_stale,
            LifecycleFilter::ActiveLowerVersion => status.active_lower_version,
            LifecycleFilter::Stale => !status.has_active,
        }
    }
}

/// Map from definition id to its current status.
#[derive(Debug, Clone, Default)]
pub struct ArtifactIndex {
    entries: BTreeMap<String, DefinitionStatus>,
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from freshly listed definitions.
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a ArtifactDefinition>) -> Self {
        let mut index = Self::new();
        for definition in definitions {
            index.record_definition(definition);
        }
        index
    }

    /// Insert or refresh the definition-level status.
    ///
    /// A version count and warning recorded earlier survive a refresh.
    pub fn record_definition(&mut self, definition: &ArtifactDefinition) {
        let mut status = DefinitionStatus::from_definition(definition);
        if let Some(previous) = self.entries.get(&definition.id) {
            status.version_count = previous.version_count;
            status.warning = previous.warning.clone();
        }
        self.entries.insert(definition.id.clone(), status);
    }

    /// Merge a full classification into the index.
    pub fn record_classification(&mut self, classification: &Classification) {
        let entry = self
            .entries
            .entry(classification.definition_id.clone())
            .or_insert_with(|| DefinitionStatus {
                definition_id: classification.definition_id.clone(),
                developer_name: classification.developer_name.clone(),
                latest_version_number: None,
                active_version_number: None,
                has_active: classification.has_active,
                is_stale: classification.is_stale,
                active_lower_version: classification.active_lower_version,
                version_count: None,
                warning: None,
            });
        entry.has_active = classification.has_active;
        entry.is_stale = classification.is_stale;
        entry.active_lower_version = classification.active_lower_version;
        entry.version_count = Some(classification.entries.len());
        entry.warning = classification.warning.clone();
        if let Some(latest) = classification.entries.iter().find(|e| e.is_latest) {
            entry.latest_version_number = Some(latest.version.version_number);
        }
        if let Some(active) = classification.active_entry() {
            entry.active_version_number = Some(active.version.version_number);
        }
    }

    pub fn get(&self, definition_id: &str) -> Option<&DefinitionStatus> {
        self.entries.get(definition_id)
    }

    /// Look up by developer name.
    pub fn find_by_name(&self, developer_name: &str) -> Option<&DefinitionStatus> {
        self.entries.values().find(|s| s.developer_name == developer_name)
    }

    pub fn remove(&mut self, definition_id: &str) -> Option<DefinitionStatus> {
        self.entries.remove(definition_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Statuses matching `filter`, ordered by developer name.
    pub fn filter(&self, filter: LifecycleFilter) -> Vec<&DefinitionStatus> {
        let mut matched: Vec<&DefinitionStatus> =
            self.entries.values().filter(|s| filter.matches(s)).collect();
        matched.sort_by(|a, b| a.developer_name.cmp(&b.developer_name));
        matched
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefinitionStatus> {
        self.entries.values()
    }
}
