//! Flow inventory
//!
//! Lists definitions with their lifecycle annotations and classifies the
//! versions of selected flows. The [`ArtifactIndex`] built here is what
//! the CLI reads; nothing in this module prints.

use flowvault_classifier::{classify, ArtifactIndex, Classification, DefinitionStatus, LifecycleFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::resolve_flow;
use crate::client::{ClientResult, MetadataClient};
use crate::selection::SelectionSet;

/// Versions of one selected flow, or why they could not be listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVersions {
    pub selector: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only view over the metadata service
pub struct Inventory<'a> {
    client: &'a dyn MetadataClient,
}

impl<'a> Inventory<'a> {
    pub fn new(client: &'a dyn MetadataClient) -> Self {
        Self { client }
    }

    /// Index of every definition, from the definition records alone.
    pub fn index(&self) -> ClientResult<ArtifactIndex> {
        let definitions = self.client.list_definitions()?;
        debug!(count = definitions.len(), "definitions listed");
        Ok(ArtifactIndex::from_definitions(&definitions))
    }

    /// Definitions matching `filter`, ordered by developer name.
    pub fn list(&self, filter: LifecycleFilter) -> ClientResult<Vec<DefinitionStatus>> {
        let index = self.index()?;
        Ok(index.filter(filter).into_iter().cloned().collect())
    }

    /// Classify the versions of every selected flow. A flow that cannot be
    /// resolved gets an error entry; the rest are still classified.
    pub fn versions(&self, selection: &SelectionSet, index: &mut ArtifactIndex) -> Vec<FlowVersions> {
        selection
            .iter()
            .map(|selector| match resolve_flow(self.client, selector) {
                Ok(resolved) => {
                    let classification = classify(&resolved.definition, &resolved.versions);
                    if let Some(warning) = &classification.warning {
                        warn!("{}", warning);
                    }
                    index.record_definition(&resolved.definition);
                    index.record_classification(&classification);
                    FlowVersions {
                        selector: selector.to_string(),
                        name: resolved.definition.developer_name.clone(),
                        classification: Some(classification),
                        error: None,
                    }
                }
                Err(unresolved) => FlowVersions {
                    selector: selector.to_string(),
                    name: unresolved.name,
                    classification: None,
                    error: Some(unresolved.reason),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMetadataService;
    use flowvault_classifier::LifecycleState;

    fn seeded() -> MockMetadataService {
        let mock = MockMetadataService::new();
        mock.add_flow("Current_Flow", 2, Some(2));
        mock.add_flow("Behind_Flow", 3, Some(1));
        mock.add_flow("Draft_Flow", 1, None);
        mock
    }

    fn names(statuses: &[DefinitionStatus]) -> Vec<&str> {
        statuses.iter().map(|s| s.developer_name.as_str()).collect()
    }

    #[test]
    fn test_list_with_filters() {
        let mock = seeded();
        let inventory = Inventory::new(&mock);

        assert_eq!(
            names(&inventory.list(LifecycleFilter::All).unwrap()),
            vec!["Behind_Flow", "Current_Flow", "Draft_Flow"]
        );
        assert_eq!(names(&inventory.list(LifecycleFilter::Active).unwrap()), vec!["Current_Flow"]);
        assert_eq!(
            names(&inventory.list(LifecycleFilter::ActiveLowerVersion).unwrap()),
            vec!["Behind_Flow"]
        );
        assert_eq!(names(&inventory.list(LifecycleFilter::Stale).unwrap()), vec!["Draft_Flow"]);
    }

    #[test]
    fn test_versions_classified_and_indexed() {
        let mock = seeded();
        let inventory = Inventory::new(&mock);
        let mut index = inventory.index().unwrap();
        let selection = SelectionSet::parse(["Behind_Flow", "Missing_Flow"]).unwrap();

        let flows = inventory.versions(&selection, &mut index);

        let classification = flows[0].classification.as_ref().unwrap();
        assert_eq!(classification.state_of(1), Some(LifecycleState::ActiveLowerVersion));
        assert_eq!(classification.state_of(3), Some(LifecycleState::Inactive));
        assert_eq!(flows[1].error.as_deref(), Some("flow not found"));

        let status = index.find_by_name("Behind_Flow").unwrap();
        assert_eq!(status.version_count, Some(3));
    }
}
