//! Restore one flow from a bundle

use std::path::{Path, PathBuf};
use std::time::Instant;

use flowvault_protocol::{OrgContext, VersionStatus};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::batch::generate_batch_id;
use crate::cancel::CancelToken;
use crate::client::{ClientError, MetadataClient};
use crate::summary::{BatchSummary, ExitCode, FailureKind, FailureReason, UnitStatus};

use super::layout::{BundleFile, BundleLayout};
use super::record::{BundleError, DefinitionRecord, RecordFormat, VersionRecord};
use super::state::{RestoreProgress, RestoreState, RestoreStateError};

/// Errors that stop a restore before anything is created
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("invalid bundle: {0}")]
    Bundle(#[from] BundleError),

    #[error("metadata service unreachable: {0}")]
    Unreachable(#[source] ClientError),

    #[error(transparent)]
    State(#[from] RestoreStateError),
}

impl RestoreError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RestoreError::Bundle(_) => ExitCode::Format,
            RestoreError::Unreachable(_) => ExitCode::Unreachable,
            RestoreError::State(_) => ExitCode::UnitFailures,
        }
    }
}

/// A version created by the restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVersion {
    pub version_number: u32,
    pub version_id: String,
    pub status: VersionStatus,
}

/// Result of one restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub bundle: PathBuf,
    pub developer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<OrgContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version_number: Option<u32>,
    pub progress: RestoreProgress,
    pub created: Vec<CreatedVersion>,
    pub failed: Vec<FailureReason>,
    /// Versions never attempted because the restore was aborted or cancelled
    pub not_attempted: Vec<u32>,
    pub cancelled: bool,
    pub summary: BatchSummary,
}

impl RestoreReport {
    pub fn state(&self) -> RestoreState {
        self.progress.state
    }
}

/// Recreates flows from bundles
pub struct RestoreEngine<'a> {
    client: &'a dyn MetadataClient,
    cancel: CancelToken,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(client: &'a dyn MetadataClient) -> Self {
        Self {
            client,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Restore the flow whose bundle contains `bundle_path`.
    ///
    /// `bundle_path` may name the definition record or any version file;
    /// its extension picks the preferred format. Every record is parsed
    /// before the first remote call. A failed definition create, or a
    /// cancel seen before it, ends the restore `Aborted`; failed version
    /// creates end it `PartiallyCompleted`. Both are reported, not returned as errors.
    pub fn restore_artifact(&self, bundle_path: &Path) -> Result<RestoreReport, RestoreError> {
        let started = Instant::now();
        let (definition, versions) = load_bundle(bundle_path)?;
        let name = definition.developer_name.clone();

        let org = self.client.get_org_context().map_err(RestoreError::Unreachable)?;
        info!(banner = %org.banner(), flow = %name, versions = versions.len(), "restore started");

        let mut progress = RestoreProgress::new(versions.len());
        let mut created = Vec::new();
        let mut failed = Vec::new();
        let mut not_attempted = Vec::new();
        let mut units = Vec::new();
        let mut cancelled = false;

        let definition_id = if self.cancel.is_cancelled() {
            warn!(flow = %name, "restore cancelled before the definition was created");
            progress.transition(RestoreState::Aborted)?;
            not_attempted.extend(versions.iter().map(|v| v.version_number));
            cancelled = true;
            None
        } else {
            match self.client.create_definition(&definition.to_spec()) {
                Ok(id) => {
                    progress.transition(RestoreState::DefinitionCreated)?;
                    info!(flow = %name, definition_id = %id, "definition created");
                    Some(id)
                }
                Err(e) => {
                    error!(flow = %name, error = %e, "creating definition failed, restore aborted");
                    progress.transition(RestoreState::Aborted)?;
                    failed.push(FailureReason::flow(format!("creating definition failed: {}", e)));
                    units.push(UnitStatus::Failed(failure_kind(&e)));
                    not_attempted.extend(versions.iter().map(|v| v.version_number));
                    None
                }
            }
        };

        if let Some(definition_id) = &definition_id {
            for version in &versions {
                let number = version.version_number;
                if self.cancel.is_cancelled() {
                    not_attempted.push(number);
                    continue;
                }
                if progress.state == RestoreState::DefinitionCreated {
                    progress.transition(RestoreState::VersionsCreating)?;
                }

                let spec = version.to_spec(definition_id, definition.active_version_number);
                match self.client.create_version(&spec) {
                    Ok(version_id) => {
                        info!(flow = %name, version = number, status = %spec.status, "version created");
                        progress.record_created();
                        units.push(UnitStatus::Succeeded);
                        created.push(CreatedVersion {
                            version_number: number,
                            version_id,
                            status: spec.status,
                        });
                    }
                    Err(e) => {
                        error!(flow = %name, version = number, error = %e, "creating version failed");
                        units.push(UnitStatus::Failed(failure_kind(&e)));
                        failed.push(FailureReason::version(number, format!("creating version failed: {}", e)));
                    }
                }
            }

            if !not_attempted.is_empty() {
                warn!(flow = %name, not_attempted = not_attempted.len(), "restore cancelled");
                cancelled = true;
            }
            progress.finish()?;
        }

        let summary = BatchSummary::from_units(
            generate_batch_id(),
            "restore",
            &units,
            if cancelled { not_attempted.len() } else { 0 },
            cancelled,
            started.elapsed().as_millis() as u64,
        );
        info!(flow = %name, state = ?progress.state, summary = %summary.human_summary, "restore finished");

        Ok(RestoreReport {
            bundle: bundle_path.to_path_buf(),
            developer_name: name,
            org: Some(org),
            definition_id,
            active_version_number: definition.active_version_number,
            progress,
            created,
            failed,
            not_attempted,
            cancelled,
            summary,
        })
    }
}

fn failure_kind(error: &ClientError) -> FailureKind {
    if error.is_unreachable() {
        FailureKind::Unreachable
    } else {
        FailureKind::Transport
    }
}

/// Parse the definition record and every version record of the bundle
/// containing `path`, versions ascending.
pub fn load_bundle(path: &Path) -> Result<(DefinitionRecord, Vec<VersionRecord>), BundleError> {
    let not_ours = || BundleError::NotABundleFile(path.to_path_buf());
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(not_ours)?;
    let file = BundleFile::parse(file_name).ok_or_else(not_ours)?;
    let layout = BundleLayout::containing(path).ok_or_else(not_ours)?;

    let preferred = match &file {
        BundleFile::Definition { .. } => RecordFormat::Structured,
        BundleFile::Version { format, .. } => *format,
    };
    let name = file.developer_name();

    let definition_path = layout.definition_path(name);
    if !definition_path.is_file() {
        return Err(BundleError::MissingDefinitionRecord(name.to_string()));
    }
    let definition = DefinitionRecord::read(&definition_path, name)?;

    let mut versions = Vec::new();
    for (number, files) in layout.discover_versions(name) {
        if let Some((version_path, format)) = files.pick(preferred) {
            versions.push(VersionRecord::read(version_path, name, number, format)?);
        }
    }
    if versions.is_empty() {
        return Err(BundleError::NoVersions(name.to_string()));
    }

    Ok((definition, versions))
}
