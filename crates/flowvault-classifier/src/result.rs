//! Classification result types.

use flowvault_protocol::ArtifactVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived lifecycle state of one version. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// The active version, and it is also the latest.
    Active,
    /// Not the active version.
    Inactive,
    /// The active version, while newer versions exist.
    ActiveLowerVersion,
    /// The listing and the definition disagree about the active version.
    Unknown,
}

impl LifecycleState {
    /// Whether the version serves traffic.
    pub fn is_live(&self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::ActiveLowerVersion)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Inactive => "inactive",
            LifecycleState::ActiveLowerVersion => "active (lower version)",
            LifecycleState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anomaly found while classifying. Processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataConsistencyWarning {
    /// `active_version_id` does not appear among the listed versions.
    ActiveVersionNotListed {
        definition_id: String,
        developer_name: String,
        active_version_id: String,
    },
}

impl fmt::Display for DataConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataConsistencyWarning::ActiveVersionNotListed {
                developer_name,
                active_version_id,
                ..
            } => write!(
                f,
                "{}: active version {} is not among the listed versions",
                developer_name, active_version_id
            ),
        }
    }
}

/// One version with its derived state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedVersion {
    pub version: ArtifactVersion,
    pub state: LifecycleState,
    pub is_latest: bool,
}

/// Classification of one definition's versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub definition_id: String,
    pub developer_name: String,
    pub has_active: bool,
    pub is_stale: bool,
    pub active_lower_version: bool,
    pub entries: Vec<ClassifiedVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<DataConsistencyWarning>,
}

impl Classification {
    /// State of the version with `version_number`, if listed.
    pub fn state_of(&self, version_number: u32) -> Option<LifecycleState> {
        self.entries
            .iter()
            .find(|e| e.version.version_number == version_number)
            .map(|e| e.state)
    }

    /// The entry serving traffic, if any.
    pub fn active_entry(&self) -> Option<&ClassifiedVersion> {
        self.entries.iter().find(|e| e.state.is_live())
    }

    pub fn count(&self, state: LifecycleState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    /// `(version, state)` pairs in listing order.
    pub fn pairs(&self) -> impl Iterator<Item = (&ArtifactVersion, LifecycleState)> {
        self.entries.iter().map(|e| (&e.version, e.state))
    }
}
