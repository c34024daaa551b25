//! Policy engine: runs a retention policy over a selection

use std::time::Instant;

use flowvault_classifier::classify;
use flowvault_protocol::OrgContext;
use tracing::{error, info, warn};

use crate::batch::{
    generate_batch_id, preflight, resolve_flow, run_units, BatchError, BatchOptions, ResolvedFlow,
};
use crate::cancel::CancelToken;
use crate::client::{DeleteOutcome, MetadataClient};
use crate::selection::{ArtifactSelector, SelectionSet};
use crate::summary::FailureReason;

use super::report::{
    DefinitionOutcome, DeletionPlan, DeletionReport, PlanReport, UnitOutcome, VersionOutcome,
    VersionResult,
};
use super::RetentionPolicy;

/// Runs retention policies against a metadata client
pub struct PolicyEngine<'a> {
    client: &'a dyn MetadataClient,
    options: BatchOptions,
}

impl<'a> PolicyEngine<'a> {
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

    /// Delete every version except the active one.
    pub fn delete_all_except_active(&self, selection: &SelectionSet) -> Result<DeletionReport, BatchError> {
        self.apply(RetentionPolicy::KeepActive, selection)
    }

    /// Delete every version except the latest one.
    pub fn delete_all_except_latest(&self, selection: &SelectionSet) -> Result<DeletionReport, BatchError> {
        self.apply(RetentionPolicy::KeepLatest, selection)
    }

    /// Delete every version.
    pub fn delete_entire_artifact(&self, selection: &SelectionSet) -> Result<DeletionReport, BatchError> {
        self.apply(RetentionPolicy::DeleteAll, selection)
    }

    /// Run `policy` over `selection`.
    ///
    /// Fails only if the batch cannot begin (empty selection, service
    /// unreachable). Everything after that lands in the report.
    pub fn apply(&self, policy: RetentionPolicy, selection: &SelectionSet) -> Result<DeletionReport, BatchError> {
        let org = self.preflight(selection)?;
        let batch_id = generate_batch_id();
        let started = Instant::now();
        info!(batch_id = %batch_id, %policy, flows = selection.len(), "deletion batch started");

        let outcome = run_units(selection.as_slice(), &self.options, |selector| {
            self.process_definition(policy, selector)
        });

        let not_started: Vec<String> = outcome
            .not_started
            .iter()
            .filter_map(|&i| selection.as_slice().get(i))
            .map(ToString::to_string)
            .collect();
        if !not_started.is_empty() {
            warn!(batch_id = %batch_id, not_started = not_started.len(), "deletion batch cancelled");
        }

        let report = DeletionReport::from_outcomes(
            &batch_id,
            policy,
            Some(org),
            outcome.completed,
            not_started,
            started.elapsed().as_millis() as u64,
        );
        info!(batch_id = %batch_id, summary = %report.summary.human_summary, "deletion batch finished");
        Ok(report)
    }

    /// Compute what `policy` would delete, without deleting anything.
    pub fn plan(&self, policy: RetentionPolicy, selection: &SelectionSet) -> Result<PlanReport, BatchError> {
        let org = self.preflight(selection)?;

        let plans = selection
            .iter()
            .map(|selector| {
                let mut plan = DeletionPlan {
                    selector: selector.to_string(),
                    name: selector.value().to_string(),
                    classification: None,
                    delete: Vec::new(),
                    keep: Vec::new(),
                    skip_reason: None,
                };

                let resolved = match self.resolve(selector) {
                    Ok(resolved) => resolved,
                    Err(outcome) => {
                        plan.skip_reason = Some(match outcome.outcome {
                            UnitOutcome::Skipped { reason } => reason,
                            UnitOutcome::Failed { reasons } => reasons
                                .into_iter()
                                .map(|r| r.reason)
                                .collect::<Vec<_>>()
                                .join("; "),
                            UnitOutcome::Deleted => String::new(),
                        });
                        return plan;
                    }
                };

                let classification = classify(&resolved.definition, &resolved.versions);
                plan.name = resolved.definition.developer_name.clone();
                if classification.warning.is_some() && policy.needs_consistent_listing() {
                    plan.skip_reason = Some(inconsistent_reason(policy));
                } else {
                    let eligible = policy.eligible(&resolved.definition, &resolved.versions);
                    for version in &resolved.versions {
                        if eligible.iter().any(|e| e.id == version.id) {
                            plan.delete.push(version.clone());
                        } else {
                            plan.keep.push(version.clone());
                        }
                    }
                }
                plan.classification = Some(classification);
                plan
            })
            .collect();

        Ok(PlanReport {
            policy,
            org: Some(org),
            plans,
        })
    }

    fn preflight(&self, selection: &SelectionSet) -> Result<OrgContext, BatchError> {
        preflight(self.client, selection)
    }

    /// Resolve the selector and list versions. `Err` carries the finished
    /// outcome when there is nothing to act on.
    fn resolve(&self, selector: &ArtifactSelector) -> Result<ResolvedFlow, DefinitionOutcome> {
        resolve_flow(self.client, selector).map_err(|unresolved| DefinitionOutcome {
            selector: selector.to_string(),
            name: unresolved.name,
            definition_id: unresolved.definition_id,
            outcome: if unresolved.failed {
                UnitOutcome::Failed {
                    reasons: vec![FailureReason::flow(unresolved.reason)],
                }
            } else {
                UnitOutcome::Skipped {
                    reason: unresolved.reason,
                }
            },
            versions: Vec::new(),
            warning: None,
        })
    }

    /// One unit of work: never panics, never returns an error.
    fn process_definition(&self, policy: RetentionPolicy, selector: &ArtifactSelector) -> DefinitionOutcome {
        let resolved = match self.resolve(selector) {
            Ok(resolved) => resolved,
            Err(outcome) => {
                log_outcome(&outcome);
                return outcome;
            }
        };
        let ResolvedFlow { definition, versions } = resolved;

        let classification = classify(&definition, &versions);
        let mut outcome = DefinitionOutcome {
            selector: selector.to_string(),
            name: definition.developer_name.clone(),
            definition_id: Some(definition.id.clone()),
            outcome: UnitOutcome::Skipped {
                reason: String::new(),
            },
            versions: Vec::new(),
            warning: classification.warning.clone(),
        };

        if let Some(warning) = &classification.warning {
            warn!(flow = %definition.developer_name, "{}", warning);
            if policy.needs_consistent_listing() {
                outcome.outcome = UnitOutcome::Skipped {
                    reason: inconsistent_reason(policy),
                };
                log_outcome(&outcome);
                return outcome;
            }
        }

        let eligible = policy.eligible(&definition, &versions);
        if eligible.is_empty() {
            outcome.outcome = UnitOutcome::Skipped {
                reason: format!("nothing to delete under {}", policy),
            };
            log_outcome(&outcome);
            return outcome;
        }

        for version in eligible {
            let result = match self.client.delete_version(&version.id) {
                Ok(DeleteOutcome::Deleted) => VersionResult::Deleted,
                Ok(DeleteOutcome::Refused(reason)) => {
                    warn!(
                        flow = %definition.developer_name,
                        version = version.version_number,
                        %reason,
                        "deletion refused"
                    );
                    VersionResult::SkippedActive
                }
                Ok(DeleteOutcome::NotFound) => VersionResult::SkippedMissing,
                Err(e) => {
                    error!(
                        flow = %definition.developer_name,
                        version = version.version_number,
                        error = %e,
                        "deletion failed"
                    );
                    VersionResult::Failed(e.to_string())
                }
            };
            outcome.versions.push(VersionOutcome {
                version_id: version.id.clone(),
                version_number: version.version_number,
                result,
            });
        }

        let reasons: Vec<FailureReason> = outcome
            .versions
            .iter()
            .filter_map(|v| match &v.result {
                VersionResult::Failed(reason) => Some(FailureReason::version(v.version_number, reason.clone())),
                _ => None,
            })
            .collect();

        outcome.outcome = if !reasons.is_empty() {
            UnitOutcome::Failed { reasons }
        } else if outcome.deleted_count() > 0 {
            UnitOutcome::Deleted
        } else {
            UnitOutcome::Skipped {
                reason: "no eligible version could be deleted".to_string(),
            }
        };

        log_outcome(&outcome);
        outcome
    }
}

fn inconsistent_reason(policy: RetentionPolicy) -> String {
    format!(
        "active version is not among the listed versions; {} not applied",
        policy
    )
}

fn log_outcome(outcome: &DefinitionOutcome) {
    match &outcome.outcome {
        UnitOutcome::Deleted => {
            info!(flow = %outcome.name, deleted = outcome.deleted_count(), "versions deleted")
        }
        UnitOutcome::Skipped { reason } => warn!(flow = %outcome.name, %reason, "skipped"),
        UnitOutcome::Failed { reasons } => {
            error!(flow = %outcome.name, failures = reasons.len(), "deletion had failures")
        }
    }
}
