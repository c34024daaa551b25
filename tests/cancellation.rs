//! Cooperative cancellation: a token cancelled mid-batch stops new
//! definitions from starting while the one in flight completes.

use std::sync::atomic::{AtomicUsize, Ordering};

use flowvault::backup::BackupEngine;
use flowvault::cancel::{CancelReason, CancelToken};
use flowvault::client::{ClientResult, DeleteOutcome, MetadataClient, VersionPayload};
use flowvault::mock::{MockMetadataService, MockOp};
use flowvault::policy::{PolicyEngine, RetentionPolicy};
use flowvault::selection::SelectionSet;
use flowvault::signal::{SignalAction, SignalState};
use flowvault::summary::{ExitCode, Status};
use flowvault_protocol::{ArtifactDefinition, ArtifactVersion, DefinitionSpec, OrgContext, VersionSpec};
use tempfile::TempDir;

/// Cancels `token` while listing the versions of the `after`-th definition
struct CancellingClient {
    inner: MockMetadataService,
    token: CancelToken,
    after: usize,
    listed: AtomicUsize,
}

impl CancellingClient {
    fn new(inner: MockMetadataService, token: CancelToken, after: usize) -> Self {
        Self {
            inner,
            token,
            after,
            listed: AtomicUsize::new(0),
        }
    }
}

impl MetadataClient for CancellingClient {
    fn list_definitions(&self) -> ClientResult<Vec<ArtifactDefinition>> {
        self.inner.list_definitions()
    }

    fn get_definition(&self, developer_name: &str) -> ClientResult<Option<ArtifactDefinition>> {
        self.inner.get_definition(developer_name)
    }

    fn get_definition_by_id(&self, definition_id: &str) -> ClientResult<Option<ArtifactDefinition>> {
        self.inner.get_definition_by_id(definition_id)
    }

    fn list_versions(&self, definition_id: &str) -> ClientResult<Vec<ArtifactVersion>> {
        if self.listed.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel(CancelReason::Signal);
        }
        self.inner.list_versions(definition_id)
    }

    fn fetch_version_payload(&self, version_id: &str) -> ClientResult<Option<VersionPayload>> {
        self.inner.fetch_version_payload(version_id)
    }

    fn delete_version(&self, version_id: &str) -> ClientResult<DeleteOutcome> {
        self.inner.delete_version(version_id)
    }

    fn create_definition(&self, spec: &DefinitionSpec) -> ClientResult<String> {
        self.inner.create_definition(spec)
    }

    fn create_version(&self, spec: &VersionSpec) -> ClientResult<String> {
        self.inner.create_version(spec)
    }

    fn get_org_context(&self) -> ClientResult<OrgContext> {
        self.inner.get_org_context()
    }
}

fn seeded(count: usize) -> (MockMetadataService, Vec<String>) {
    let mock = MockMetadataService::new();
    let names: Vec<String> = (0..count).map(|i| format!("Flow_{:02}", i)).collect();
    for name in &names {
        mock.add_flow(name, 3, Some(3));
    }
    (mock, names)
}

#[test]
fn test_deletion_stops_after_current_definition() {
    let (mock, names) = seeded(10);
    let token = CancelToken::new();
    let client = CancellingClient::new(mock.clone(), token.clone(), 3);

    let selection = SelectionSet::parse(&names).unwrap();
    let report = PolicyEngine::new(&client)
        .with_cancel(token)
        .apply(RetentionPolicy::KeepActive, &selection)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.definitions.len(), 3);
    assert_eq!(report.deleted_artifacts, vec!["Flow_00", "Flow_01", "Flow_02"]);
    assert_eq!(report.not_started.len(), 7);
    assert_eq!(report.not_started[0], "Flow_03");
    assert_eq!(report.summary.status, Status::Cancelled);
    assert_eq!(report.summary.exit_code_enum(), Some(ExitCode::Cancelled));

    // The definition in flight finished; nothing after it was touched
    assert_eq!(mock.calls_for(MockOp::DeleteVersion).len(), 6);
    let untouched = mock.definition_by_name("Flow_03").unwrap();
    assert_eq!(mock.versions_of(&untouched.id).len(), 3);
}

#[test]
fn test_backup_reports_only_processed_flows() {
    let (mock, names) = seeded(5);
    let token = CancelToken::new();
    let client = CancellingClient::new(mock, token.clone(), 2);
    let dir = TempDir::new().unwrap();

    let selection = SelectionSet::parse(&names).unwrap();
    let report = BackupEngine::new(&client)
        .with_cancel(token)
        .backup_artifacts(&selection, dir.path())
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.backed_up, vec!["Flow_00", "Flow_01"]);
    assert_eq!(report.not_started, vec!["Flow_02", "Flow_03", "Flow_04"]);
    assert_eq!(report.summary.not_started, 3);
    assert!(!dir
        .path()
        .join("force-app/main/default/flows/Flow_02-1.flow.json")
        .exists());
}

#[test]
fn test_signal_cancels_the_shared_token() {
    let token = CancelToken::new();
    let state = SignalState::with_token(token.clone());

    assert_eq!(state.handle_signal(), SignalAction::InitiateCancellation);
    assert!(token.is_cancelled());

    // A cancelled token stops a batch before its first definition
    let (mock, names) = seeded(2);
    let selection = SelectionSet::parse(&names).unwrap();
    let report = PolicyEngine::new(&mock)
        .with_cancel(token)
        .apply(RetentionPolicy::DeleteAll, &selection)
        .unwrap();
    assert!(report.definitions.is_empty());
    assert_eq!(report.not_started.len(), 2);
    assert!(mock.calls_for(MockOp::DeleteVersion).is_empty());
}
