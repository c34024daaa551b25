//! Deletion plans and reports

use flowvault_classifier::{Classification, DataConsistencyWarning};
use flowvault_protocol::{ArtifactVersion, OrgContext};
use serde::{Deserialize, Serialize};

use crate::summary::{BatchSummary, FailedArtifact, FailureKind, FailureReason, SkipEntry, UnitStatus};

use super::RetentionPolicy;

/// What happened to one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum VersionResult {
    Deleted,
    /// The service refused: the version is active
    SkippedActive,
    /// The version was already gone
    SkippedMissing,
    Failed(String),
}

impl VersionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, VersionResult::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionOutcome {
    pub version_id: String,
    pub version_number: u32,
    #[serde(flatten)]
    pub result: VersionResult,
}

/// Outcome of one definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// At least one version deleted and none failed
    Deleted,
    /// Nothing deleted and nothing failed
    Skipped { reason: String },
    /// At least one failure
    Failed { reasons: Vec<FailureReason> },
}

/// Per-definition detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionOutcome {
    /// Selector as the operator gave it
    pub selector: String,
    /// Developer name when resolved, else the selector value
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<DataConsistencyWarning>,
}

impl DefinitionOutcome {
    /// True iff at least one deletion occurred and none failed
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Deleted)
    }

    pub fn deleted_count(&self) -> usize {
        self.versions
            .iter()
            .filter(|v| v.result == VersionResult::Deleted)
            .count()
    }

    pub fn unit_status(&self) -> UnitStatus {
        match self.outcome {
            UnitOutcome::Deleted => UnitStatus::Succeeded,
            UnitOutcome::Skipped { .. } => UnitStatus::Skipped,
            UnitOutcome::Failed { .. } => UnitStatus::Failed(FailureKind::Transport),
        }
    }
}

/// Result of one deletion batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub policy: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<OrgContext>,
    pub deleted_artifacts: Vec<String>,
    pub failed_artifacts: Vec<FailedArtifact>,
    pub skipped: Vec<SkipEntry>,
    pub warnings: Vec<DataConsistencyWarning>,
    pub definitions: Vec<DefinitionOutcome>,
    /// Selectors never started because the batch was cancelled
    pub not_started: Vec<String>,
    pub cancelled: bool,
    pub summary: BatchSummary,
}

impl DeletionReport {
    /// Build the report from per-definition outcomes.
    pub fn from_outcomes(
        batch_id: &str,
        policy: RetentionPolicy,
        org: Option<OrgContext>,
        definitions: Vec<DefinitionOutcome>,
        not_started: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        let mut deleted_artifacts = Vec::new();
        let mut failed_artifacts = Vec::new();
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();

        for definition in &definitions {
            match &definition.outcome {
                UnitOutcome::Deleted => deleted_artifacts.push(definition.name.clone()),
                UnitOutcome::Skipped { reason } => skipped.push(SkipEntry {
                    name: definition.name.clone(),
                    version_number: None,
                    reason: reason.clone(),
                }),
                UnitOutcome::Failed { reasons } => failed_artifacts.push(FailedArtifact {
                    name: definition.name.clone(),
                    reasons: reasons.clone(),
                }),
            }

            for version in &definition.versions {
                let reason = match version.result {
                    VersionResult::SkippedActive => "active version, deletion refused by the service",
                    VersionResult::SkippedMissing => "version no longer exists",
                    _ => continue,
                };
                skipped.push(SkipEntry {
                    name: definition.name.clone(),
                    version_number: Some(version.version_number),
                    reason: reason.to_string(),
                });
            }

            if let Some(warning) = &definition.warning {
                warnings.push(warning.clone());
            }
        }

        let units: Vec<UnitStatus> = definitions.iter().map(DefinitionOutcome::unit_status).collect();
        let cancelled = !not_started.is_empty();
        let summary = BatchSummary::from_units(
            batch_id,
            format!("delete:{}", policy),
            &units,
            not_started.len(),
            cancelled,
            duration_ms,
        );

        Self {
            policy,
            org,
            deleted_artifacts,
            failed_artifacts,
            skipped,
            warnings,
            definitions,
            not_started,
            cancelled,
            summary,
        }
    }
}

/// What a policy would delete for one definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub selector: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub delete: Vec<ArtifactVersion>,
    pub keep: Vec<ArtifactVersion>,
    /// Why nothing will happen, if so
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Dry-run result for a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub policy: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<OrgContext>,
    pub plans: Vec<DeletionPlan>,
}

impl PlanReport {
    /// Number of versions the plan would delete
    pub fn delete_count(&self) -> usize {
        self.plans.iter().map(|p| p.delete.len()).sum()
    }
}
