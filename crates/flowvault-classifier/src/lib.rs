//! Lifecycle classification of flow versions.
//!
//! Given one definition and its version list, computes the lifecycle state
//! of every version and the artifact-level flags. No I/O; the same inputs
//! always produce the same output.

mod index;
mod result;

pub use index::{ArtifactIndex, DefinitionStatus, LifecycleFilter};
pub use result::{ClassifiedVersion, Classification, DataConsistencyWarning, LifecycleState};

use flowvault_protocol::{ArtifactDefinition, ArtifactVersion};

/// Classify every version of `definition`.
///
/// A definition without an active version is treated as never activated:
/// every version is `Inactive`. An `active_version_id` that is not among
/// `versions` produces a [`DataConsistencyWarning`] and every version is
/// reported as `Unknown`, because the service's view and the listing
/// disagree and neither can be trusted to pick the live version.
pub fn classify(definition: &ArtifactDefinition, versions: &[ArtifactVersion]) -> Classification {
    let active_lower = has_active_lower_version(definition);

    let warning = match definition.active_version_id.as_deref() {
        Some(active_id) if !versions.is_empty() && !versions.iter().any(|v| v.id == active_id) => {
            Some(DataConsistencyWarning::ActiveVersionNotListed {
                definition_id: definition.id.clone(),
                developer_name: definition.developer_name.clone(),
                active_version_id: active_id.to_string(),
            })
        }
        _ => None,
    };

    let entries = versions
        .iter()
        .map(|version| {
            let state = if warning.is_some() {
                LifecycleState::Unknown
            } else {
                version_state(definition, version, active_lower)
            };
            ClassifiedVersion {
                version: version.clone(),
                state,
                is_latest: definition.is_latest_version(&version.id),
            }
        })
        .collect();

    Classification {
        definition_id: definition.id.clone(),
        developer_name: definition.developer_name.clone(),
        has_active: definition.has_active(),
        is_stale: is_stale(definition),
        active_lower_version: active_lower,
        entries,
        warning,
    }
}

/// The active version exists but is not the latest one.
pub fn has_active_lower_version(definition: &ArtifactDefinition) -> bool {
    match (&definition.active_version_id, &definition.latest_version_id) {
        (Some(active), Some(latest)) => active != latest,
        _ => false,
    }
}

/// The latest version is not the one serving traffic (including never activated).
pub fn is_stale(definition: &ArtifactDefinition) -> bool {
    match (&definition.active_version_id, &definition.latest_version_id) {
        (Some(active), Some(latest)) => active != latest,
        (None, Some(_)) => true,
        _ => false,
    }
}

fn version_state(
    definition: &ArtifactDefinition,
    version: &ArtifactVersion,
    active_lower: bool,
) -> LifecycleState {
    if !definition.is_active_version(&version.id) {
        LifecycleState::Inactive
    } else if active_lower {
        LifecycleState::ActiveLowerVersion
    } else {
        LifecycleState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(def_id: &str, count: u32) -> Vec<ArtifactVersion> {
        (1..=count)
            .map(|n| ArtifactVersion::new(format!("301V{}", n), def_id, n))
            .collect()
    }

    fn definition(active: Option<u32>, latest: Option<u32>) -> ArtifactDefinition {
        let mut def = ArtifactDefinition::new("300D", "Lead_Router");
        def.active_version_id = active.map(|n| format!("301V{}", n));
        def.active_version_number = active;
        def.latest_version_id = latest.map(|n| format!("301V{}", n));
        def.latest_version_number = latest;
        def
    }

    #[test]
    fn test_active_equals_latest() {
        let def = definition(Some(3), Some(3));
        let result = classify(&def, &versions("300D", 3));

        assert!(!result.active_lower_version);
        assert!(!has_active_lower_version(&def));
        assert!(result.has_active);
        assert!(!result.is_stale);
        assert_eq!(result.state_of(3), Some(LifecycleState::Active));
        assert_eq!(result.state_of(1), Some(LifecycleState::Inactive));
        assert_eq!(result.count(LifecycleState::Active), 1);
    }

    #[test]
    fn test_active_lower_version() {
        let def = definition(Some(2), Some(4));
        let result = classify(&def, &versions("300D", 4));

        assert!(result.active_lower_version);
        assert!(result.is_stale);
        assert_eq!(result.state_of(2), Some(LifecycleState::ActiveLowerVersion));
        assert_eq!(result.state_of(4), Some(LifecycleState::Inactive));
        assert!(result.entries[3].is_latest);
        assert_eq!(result.active_entry().map(|e| e.version.version_number), Some(2));
    }

    #[test]
    fn test_never_activated() {
        let def = definition(None, Some(2));
        let result = classify(&def, &versions("300D", 2));

        assert!(!result.has_active);
        assert!(!result.active_lower_version);
        assert!(result.is_stale);
        assert!(result.entries.iter().all(|e| e.state == LifecycleState::Inactive));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_no_versions() {
        let def = definition(Some(1), Some(1));
        let result = classify(&def, &[]);

        assert!(result.entries.is_empty());
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_active_id_not_listed() {
        let def = definition(Some(9), Some(3));
        let result = classify(&def, &versions("300D", 3));

        assert!(result.entries.iter().all(|e| e.state == LifecycleState::Unknown));
        match result.warning {
            Some(DataConsistencyWarning::ActiveVersionNotListed { ref active_version_id, .. }) => {
                assert_eq!(active_version_id, "301V9");
            }
            None => panic!("expected a consistency warning"),
        }
    }

    #[test]
    fn test_at_most_one_active_entry() {
        for active in 1..=5 {
            let def = definition(Some(active), Some(5));
            let result = classify(&def, &versions("300D", 5));
            let live = result
                .entries
                .iter()
                .filter(|e| e.state.is_live())
                .count();
            assert_eq!(live, 1);
        }
    }

    #[test]
    fn test_deterministic() {
        let def = definition(Some(2), Some(3));
        let vs = versions("300D", 3);
        assert_eq!(classify(&def, &vs), classify(&def, &vs));
    }
}
