//! Batch execution shared by the deletion and backup engines
//!
//! A batch is a list of independent units of work (one per selected
//! flow). Units are isolated from each other: a unit reports its own
//! failures and never aborts its siblings. The executor:
//!
//! - runs units sequentially, or on up to `concurrency` scoped worker
//!   threads that send results back over a channel
//! - checks the [`CancelToken`] before starting each unit; units already
//!   started finish, units never started are reported as such
//! - returns completed results in input order regardless of how they ran

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use flowvault_protocol::{ArtifactDefinition, ArtifactVersion, OrgContext};
use tracing::info;

use crate::cancel::CancelToken;
use crate::client::{ClientError, MetadataClient};
use crate::selection::{ArtifactSelector, SelectionError, SelectionSet};
use crate::summary::ExitCode;

/// Errors that prevent a batch from starting. Once a batch is running,
/// failures are folded into its report instead.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The service could not be reached during preflight
    #[error("metadata service unreachable: {0}")]
    Unreachable(#[source] ClientError),

    /// Nothing to do
    #[error("no flows selected")]
    EmptySelection,

    /// Invalid selector
    #[error("invalid selection: {0}")]
    Selection(#[from] SelectionError),

    /// Backup destination does not exist
    #[error("backup destination does not exist: {}", .0.display())]
    MissingDestination(PathBuf),
}

impl BatchError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BatchError::Unreachable(_) => ExitCode::Unreachable,
            BatchError::EmptySelection | BatchError::Selection(_) | BatchError::MissingDestination(_) => {
                ExitCode::Config
            }
        }
    }
}

/// Generate a new batch id
pub fn generate_batch_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Execution options for a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Units run at the same time (1 = sequential)
    pub concurrency: usize,
    /// Checked before each unit
    pub cancel: CancelToken,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            cancel: CancelToken::new(),
        }
    }
}

impl BatchOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of running a batch
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// Results of the units that ran, in input order
    pub completed: Vec<R>,
    /// Input indices of the units never started
    pub not_started: Vec<usize>,
}

impl<R> BatchOutcome<R> {
    /// Whether cancellation left units unstarted
    pub fn cancelled(&self) -> bool {
        !self.not_started.is_empty()
    }
}

/// Check that a batch can begin: something is selected and the service
/// answers. Returns the org the batch will act on.
pub fn preflight(client: &dyn MetadataClient, selection: &SelectionSet) -> Result<OrgContext, BatchError> {
    if selection.is_empty() {
        return Err(BatchError::EmptySelection);
    }
    let org = client.get_org_context().map_err(BatchError::Unreachable)?;
    info!(banner = %org.banner(), "preflight ok");
    Ok(org)
}

/// A selected flow with its versions, ready to act on
#[derive(Debug, Clone)]
pub struct ResolvedFlow {
    pub definition: ArtifactDefinition,
    /// Ascending by version number, never empty
    pub versions: Vec<ArtifactVersion>,
}

/// A selector that left nothing to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Developer name when known, else the selector value
    pub name: String,
    pub definition_id: Option<String>,
    pub reason: String,
    /// A failure rather than a skip
    pub failed: bool,
}

/// Look up the selected flow and list its versions.
pub fn resolve_flow(client: &dyn MetadataClient, selector: &ArtifactSelector) -> Result<ResolvedFlow, Unresolved> {
    let definition = match selector.resolve(client) {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            return Err(Unresolved {
                name: selector.value().to_string(),
                definition_id: None,
                reason: "flow not found".to_string(),
                failed: false,
            })
        }
        Err(e) => {
            return Err(Unresolved {
                name: selector.value().to_string(),
                definition_id: None,
                reason: format!("lookup failed: {}", e),
                failed: true,
            })
        }
    };

    let unresolved = |reason: String, failed: bool| Unresolved {
        name: definition.developer_name.clone(),
        definition_id: Some(definition.id.clone()),
        reason,
        failed,
    };

    let versions = match client.list_versions(&definition.id) {
        Ok(versions) => versions,
        Err(e) => return Err(unresolved(format!("listing versions failed: {}", e), true)),
    };
    if versions.is_empty() {
        return Err(unresolved("no versions".to_string(), false));
    }

    Ok(ResolvedFlow { definition, versions })
}

/// Run `work` once per item.
pub fn run_units<T, R, F>(items: &[T], options: &BatchOptions, work: F) -> BatchOutcome<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = options.concurrency.max(1).min(items.len().max(1));
    let mut slots: Vec<Option<R>> = items.iter().map(|_| None).collect();

    if workers == 1 {
        for (index, item) in items.iter().enumerate() {
            if options.cancel.is_cancelled() {
                break;
            }
            slots[index] = Some(work(item));
        }
    } else {
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let work = &work;
                scope.spawn(move || loop {
                    if options.cancel.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    if tx.send((index, work(item))).is_err() {
                        break;
                    }
                });
            }
        });
        drop(tx);

        for (index, result) in rx {
            slots[index] = Some(result);
        }
    }

    let mut completed = Vec::new();
    let mut not_started = Vec::new();
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(result) => completed.push(result),
            None => not_started.push(index),
        }
    }

    BatchOutcome {
        completed,
        not_started,
    }
}
