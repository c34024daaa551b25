//! Backup and restore of a flow's full version history
//!
//! A backup writes one bundle per flow under a target directory (see
//! [`layout`]): a definition record plus every version twice, as
//! pretty-printed JSON and as a markup mirror. Restore reads one bundle
//! back and recreates the definition and its versions remotely.

pub mod layout;
pub mod markup;
mod record;
mod report;
mod restore;
mod state;

pub use layout::{BundleFile, BundleLayout, VersionFiles};
pub use markup::{from_markup, to_markup, MarkupError};
pub use record::{to_pretty_json, BundleError, DefinitionRecord, RecordFormat, VersionRecord};
pub use report::{BackupReport, BackupResult, FlowBackup};
pub use restore::{load_bundle, CreatedVersion, RestoreEngine, RestoreError, RestoreReport};
pub use state::{RestoreProgress, RestoreState, RestoreStateError};

use std::path::Path;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::batch::{generate_batch_id, preflight, resolve_flow, run_units, BatchError, BatchOptions};
use crate::cancel::CancelToken;
use crate::client::MetadataClient;
use crate::selection::{ArtifactSelector, SelectionSet};
use crate::summary::{FailureReason, SkipEntry};

use record::write_file;

/// Writes bundles for selected flows
pub struct BackupEngine<'a> {
    client: &'a dyn MetadataClient,
    options: BatchOptions,
}

impl<'a> BackupEngine<'a> {
    pub fn new(client: &'a dyn MetadataClient) -> Self {
        Self {
            client,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.options = self.options.with_concurrency(concurrency);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.options = self.options.with_cancel(cancel);
        self
    }

    /// Back up every selected flow under `target`, which must exist.
    pub fn backup_artifacts(&self, selection: &SelectionSet, target: &Path) -> Result<BackupReport, BatchError> {
        if !target.is_dir() {
            return Err(BatchError::MissingDestination(target.to_path_buf()));
        }
        let org = preflight(self.client, selection)?;

        let batch_id = generate_batch_id();
        let started = Instant::now();
        let layout = BundleLayout::new(target);
        info!(batch_id = %batch_id, target = %target.display(), flows = selection.len(), "backup started");

        let outcome = run_units(selection.as_slice(), &self.options, |selector| {
            self.backup_flow(&layout, selector)
        });

        let not_started: Vec<String> = outcome
            .not_started
            .iter()
            .filter_map(|&i| selection.as_slice().get(i))
            .map(ToString::to_string)
            .collect();
        if !not_started.is_empty() {
            warn!(batch_id = %batch_id, not_started = not_started.len(), "backup cancelled");
        }

        let report = BackupReport::from_flows(
            &batch_id,
            target.to_path_buf(),
            Some(org),
            outcome.completed,
            not_started,
            started.elapsed().as_millis() as u64,
        );
        info!(batch_id = %batch_id, summary = %report.summary.human_summary, "backup finished");
        Ok(report)
    }

    /// One unit of work: never panics, never returns an error.
    fn backup_flow(&self, layout: &BundleLayout, selector: &ArtifactSelector) -> FlowBackup {
        let resolved = match resolve_flow(self.client, selector) {
            Ok(resolved) => resolved,
            Err(unresolved) => {
                let result = if unresolved.failed {
                    error!(flow = %unresolved.name, reason = %unresolved.reason, "backup failed");
                    BackupResult::Failed {
                        reasons: vec![FailureReason::flow(unresolved.reason)],
                    }
                } else {
                    warn!(flow = %unresolved.name, reason = %unresolved.reason, "skipped");
                    BackupResult::Skipped {
                        reason: unresolved.reason,
                    }
                };
                return FlowBackup::new(selector.to_string(), unresolved.name, unresolved.definition_id, result);
            }
        };

        let definition = &resolved.definition;
        let name = definition.developer_name.clone();
        let mut flow = FlowBackup::new(
            selector.to_string(),
            name.clone(),
            Some(definition.id.clone()),
            BackupResult::BackedUp,
        );
        let mut failures = Vec::new();

        // Highest number present, not the live active pointer
        let record = DefinitionRecord {
            developer_name: name.clone(),
            active_version_number: resolved.versions.iter().map(|v| v.version_number).max(),
            description: definition.description.clone(),
        };
        let definition_path = layout.definition_path(&name);
        match record
            .to_markup()
            .map_err(|e| e.to_string())
            .and_then(|text| write_file(&definition_path, &text).map_err(|e| e.to_string()))
        {
            Ok(()) => flow.definition_file = Some(definition_path),
            Err(e) => failures.push(FailureReason::flow(format!("writing definition record failed: {}", e))),
        }

        for version in &resolved.versions {
            let number = version.version_number;
            let payload = match self.client.fetch_version_payload(&version.id) {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    warn!(flow = %name, version = number, "version vanished before backup");
                    flow.skipped_versions.push(SkipEntry {
                        name: name.clone(),
                        version_number: Some(number),
                        reason: "version no longer exists".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    error!(flow = %name, version = number, error = %e, "fetching payload failed");
                    failures.push(FailureReason::version(number, format!("fetching payload failed: {}", e)));
                    continue;
                }
            };

            let record = VersionRecord::new(name.clone(), number, payload);

            let json_path = layout.version_path(&name, number, RecordFormat::Structured);
            let written = record
                .to_json()
                .map_err(|e| e.to_string())
                .and_then(|text| write_file(&json_path, &text).map_err(|e| e.to_string()));
            if let Err(e) = written {
                failures.push(FailureReason::version(number, format!("writing record failed: {}", e)));
                continue;
            }
            flow.files.push(json_path);
            flow.versions.push(number);

            match record.to_markup() {
                Ok(text) => {
                    let markup_path = layout.version_path(&name, number, RecordFormat::Markup);
                    match write_file(&markup_path, &text) {
                        Ok(()) => flow.files.push(markup_path),
                        Err(e) => failures.push(FailureReason::version(
                            number,
                            format!("writing markup failed: {}", e),
                        )),
                    }
                }
                Err(e) => {
                    warn!(flow = %name, version = number, error = %e, "markup mirror skipped");
                    flow.markup_skipped.push(SkipEntry {
                        name: name.clone(),
                        version_number: Some(number),
                        reason: e.to_string(),
                    });
                }
            }
        }

        flow.result = if !failures.is_empty() {
            error!(flow = %name, failures = failures.len(), "backup had failures");
            BackupResult::Failed { reasons: failures }
        } else if !flow.versions.is_empty() {
            info!(flow = %name, versions = flow.versions.len(), "backed up");
            BackupResult::BackedUp
        } else {
            warn!(flow = %name, "no version could be fetched");
            BackupResult::Skipped {
                reason: "no version could be fetched".to_string(),
            }
        };
        flow
    }
}
