//! Backup reports

use std::path::PathBuf;

use flowvault_protocol::OrgContext;
use serde::{Deserialize, Serialize};

use crate::summary::{BatchSummary, FailedArtifact, FailureKind, FailureReason, SkipEntry, UnitStatus};

/// Outcome of backing up one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackupResult {
    /// At least one version written and no failures
    BackedUp,
    Skipped { reason: String },
    Failed { reasons: Vec<FailureReason> },
}

/// Per-flow detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBackup {
    pub selector: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    #[serde(flatten)]
    pub result: BackupResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_file: Option<PathBuf>,
    /// Version numbers whose primary record was written
    #[serde(default)]
    pub versions: Vec<u32>,
    /// Every version file written, in write order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_versions: Vec<SkipEntry>,
    /// Versions whose markup mirror could not be produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markup_skipped: Vec<SkipEntry>,
}

impl FlowBackup {
    pub(crate) fn new(selector: String, name: String, definition_id: Option<String>, result: BackupResult) -> Self {
        Self {
            selector,
            name,
            definition_id,
            result,
            definition_file: None,
            versions: Vec::new(),
            files: Vec::new(),
            skipped_versions: Vec::new(),
            markup_skipped: Vec::new(),
        }
    }

    pub fn unit_status(&self) -> UnitStatus {
        match self.result {
            BackupResult::BackedUp => UnitStatus::Succeeded,
            BackupResult::Skipped { .. } => UnitStatus::Skipped,
            BackupResult::Failed { .. } => UnitStatus::Failed(FailureKind::Transport),
        }
    }
}

/// Result of one backup batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupReport {
    pub target: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<OrgContext>,
    pub backed_up: Vec<String>,
    pub failed: Vec<FailedArtifact>,
    pub skipped: Vec<SkipEntry>,
    pub markup_skipped: Vec<SkipEntry>,
    pub flows: Vec<FlowBackup>,
    pub not_started: Vec<String>,
    pub cancelled: bool,
    pub summary: BatchSummary,
}

impl BackupReport {
    pub fn from_flows(
        batch_id: &str,
        target: PathBuf,
        org: Option<OrgContext>,
        flows: Vec<FlowBackup>,
        not_started: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        let mut backed_up = Vec::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        let mut markup_skipped = Vec::new();

        for flow in &flows {
            match &flow.result {
                BackupResult::BackedUp => backed_up.push(flow.name.clone()),
                BackupResult::Skipped { reason } => skipped.push(SkipEntry {
                    name: flow.name.clone(),
                    version_number: None,
                    reason: reason.clone(),
                }),
                BackupResult::Failed { reasons } => failed.push(FailedArtifact {
                    name: flow.name.clone(),
                    reasons: reasons.clone(),
                }),
            }
            skipped.extend(flow.skipped_versions.iter().cloned());
            markup_skipped.extend(flow.markup_skipped.iter().cloned());
        }

        let units: Vec<UnitStatus> = flows.iter().map(FlowBackup::unit_status).collect();
        let cancelled = !not_started.is_empty();
        let summary = BatchSummary::from_units(
            batch_id,
            "backup",
            &units,
            not_started.len(),
            cancelled,
            duration_ms,
        );

        Self {
            target,
            org,
            backed_up,
            failed,
            skipped,
            markup_skipped,
            flows,
            not_started,
            cancelled,
            summary,
        }
    }
}
