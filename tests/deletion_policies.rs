//! Deletion policy integration tests against the mock metadata service.

use flowvault::mock::{FailureConfig, MockMetadataService, MockOp};
use flowvault::policy::{PolicyEngine, RetentionPolicy, UnitOutcome, VersionResult};
use flowvault::selection::SelectionSet;
use flowvault::summary::ExitCode;
use flowvault::BatchError;

fn names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Flow_{:03}", i)).collect()
}

fn remaining(mock: &MockMetadataService, name: &str) -> Vec<u32> {
    let definition = mock.definition_by_name(name).unwrap();
    mock.versions_of(&definition.id)
        .iter()
        .map(|v| v.version_number)
        .collect()
}

#[test]
fn test_hundred_definitions_one_transport_failure() {
    let mock = MockMetadataService::new();
    let flows = names(100);
    for name in &flows {
        mock.add_flow(name, 3, Some(3));
    }
    let victim = mock.version_id("Flow_042", 1).unwrap();
    mock.inject_failure_for(
        MockOp::DeleteVersion,
        &victim,
        FailureConfig::http(503, "SERVER_UNAVAILABLE", "try later"),
    );

    let selection = SelectionSet::parse(&flows).unwrap();
    let report = PolicyEngine::new(&mock)
        .with_concurrency(8)
        .apply(RetentionPolicy::KeepActive, &selection)
        .unwrap();

    assert_eq!(report.definitions.len(), 100);
    assert_eq!(report.summary.succeeded + report.summary.skipped, 99);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failed_artifacts.len(), 1);
    assert_eq!(report.failed_artifacts[0].name, "Flow_042");
    assert_eq!(report.summary.exit_code_enum(), Some(ExitCode::UnitFailures));

    // Results stay in selection order under concurrency
    let order: Vec<&str> = report.definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(order, flows.iter().map(String::as_str).collect::<Vec<_>>());

    // The failing definition still deleted what it could
    assert_eq!(remaining(&mock, "Flow_042"), vec![1, 3]);
    assert_eq!(remaining(&mock, "Flow_041"), vec![3]);
    assert_eq!(remaining(&mock, "Flow_099"), vec![3]);
}

#[test]
fn test_keep_active_leaves_only_the_active_version() {
    let mock = MockMetadataService::new();
    mock.add_flow("Lead_Router", 6, Some(4));
    mock.add_flow("Case_Escalation", 2, None);

    let selection = SelectionSet::parse(["Lead_Router", "Case_Escalation"]).unwrap();
    let report = PolicyEngine::new(&mock)
        .delete_all_except_active(&selection)
        .unwrap();

    assert_eq!(remaining(&mock, "Lead_Router"), vec![4]);
    assert_eq!(report.definitions[0].deleted_count(), 5);
    // Never activated: every version goes
    assert_eq!(remaining(&mock, "Case_Escalation"), Vec::<u32>::new());
    assert_eq!(report.summary.exit_code, 0);
}

#[test]
fn test_keep_latest_never_deletes_the_latest() {
    let mock = MockMetadataService::new();
    mock.add_flow("Lead_Router", 4, Some(2));

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let report = PolicyEngine::new(&mock)
        .delete_all_except_latest(&selection)
        .unwrap();

    // v2 is active, so the service refuses; v4 is never attempted
    assert_eq!(remaining(&mock, "Lead_Router"), vec![2, 4]);
    let attempted: Vec<u32> = report.definitions[0]
        .versions
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(attempted, vec![1, 2, 3]);
    assert_eq!(report.definitions[0].versions[1].result, VersionResult::SkippedActive);
    assert_eq!(report.summary.failed, 0);
}

#[test]
fn test_delete_all_refusal_is_a_skip_not_a_failure() {
    let mock = MockMetadataService::new();
    mock.add_flow("Lead_Router", 3, Some(3));

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let report = PolicyEngine::new(&mock)
        .delete_entire_artifact(&selection)
        .unwrap();

    assert_eq!(remaining(&mock, "Lead_Router"), vec![3]);
    assert!(report.failed_artifacts.is_empty());
    assert!(report.skipped.iter().any(|s| s.version_number == Some(3)));
    assert_eq!(report.definitions[0].outcome, UnitOutcome::Deleted);
}

#[test]
fn test_inconsistent_active_pointer_blocks_keep_active() {
    let mock = MockMetadataService::new();
    let id = mock.add_flow("Lead_Router", 3, Some(2));
    mock.set_active_version_id(&id, Some("301000000000000AAA"));

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let report = PolicyEngine::new(&mock)
        .apply(RetentionPolicy::KeepActive, &selection)
        .unwrap();

    assert_eq!(remaining(&mock, "Lead_Router"), vec![1, 2, 3]);
    assert_eq!(report.warnings.len(), 1);
    assert!(mock.calls_for(MockOp::DeleteVersion).is_empty());
}

#[test]
fn test_inconsistent_active_pointer_does_not_block_keep_latest() {
    let mock = MockMetadataService::new();
    let id = mock.add_flow("Lead_Router", 3, Some(3));
    mock.set_active_version_id(&id, Some("301000000000000AAA"));

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let plan = PolicyEngine::new(&mock)
        .plan(RetentionPolicy::KeepLatest, &selection)
        .unwrap();
    assert!(plan.plans[0].skip_reason.is_none());
    assert_eq!(plan.delete_count(), 2);

    let report = PolicyEngine::new(&mock)
        .delete_all_except_latest(&selection)
        .unwrap();

    assert_eq!(remaining(&mock, "Lead_Router"), vec![3]);
    assert_eq!(report.definitions[0].deleted_count(), 2);
    assert_eq!(report.deleted_artifacts, vec!["Lead_Router"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.definitions[0].warning.is_some());
}

#[test]
fn test_plan_deletes_nothing() {
    let mock = MockMetadataService::new();
    mock.add_flow("Lead_Router", 5, Some(5));

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let plan = PolicyEngine::new(&mock)
        .plan(RetentionPolicy::KeepLatest, &selection)
        .unwrap();

    assert_eq!(plan.delete_count(), 4);
    assert_eq!(plan.plans[0].keep.len(), 1);
    assert_eq!(remaining(&mock, "Lead_Router"), vec![1, 2, 3, 4, 5]);
    assert!(mock.calls_for(MockOp::DeleteVersion).is_empty());
}

#[test]
fn test_unreachable_service_cannot_begin() {
    let mock = MockMetadataService::new();
    mock.add_flow("Lead_Router", 2, Some(2));
    mock.inject_failure(MockOp::OrgContext, FailureConfig::unreachable());

    let selection = SelectionSet::parse(["Lead_Router"]).unwrap();
    let err = PolicyEngine::new(&mock)
        .apply(RetentionPolicy::DeleteAll, &selection)
        .unwrap_err();

    assert!(matches!(err, BatchError::Unreachable(_)));
    assert_eq!(err.exit_code(), ExitCode::Unreachable);
    assert!(mock.calls_for(MockOp::DeleteVersion).is_empty());
}
