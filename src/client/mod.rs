//! Metadata client
//!
//! Read and write operations against the remote metadata service. Pure
//! transport: no retention policy or classification lives here.
//!
//! - `MetadataClient`: the seam the engines depend on
//! - `ToolingClient`: HTTPS implementation over the Tooling API
//! - `crate::mock::MockMetadataService`: in-memory implementation for tests

mod error;
mod retry;
mod tooling;

pub use error::{ClientError, ClientResult, DeleteOutcome, RefusalReason};
pub use retry::RetryPolicy;
pub use tooling::{classify_delete_response, ToolingClient, ToolingClientConfig};

use flowvault_protocol::{
    ArtifactDefinition, ArtifactVersion, DefinitionSpec, OrgContext, VersionSpec,
};
use serde_json::{Map, Value};

/// Full metadata payload of one version, field for field as fetched.
pub type VersionPayload = Map<String, Value>;

/// Operations the engines need from the metadata service.
///
/// Every call may fail with a [`ClientError`]. Expected, recoverable
/// outcomes of a delete (refusal to delete the active version, record
/// already gone) are values of [`DeleteOutcome`], not errors.
pub trait MetadataClient: Send + Sync {
    /// All flow definitions.
    fn list_definitions(&self) -> ClientResult<Vec<ArtifactDefinition>>;

    /// One definition by developer name, `None` if it does not exist.
    fn get_definition(&self, developer_name: &str) -> ClientResult<Option<ArtifactDefinition>>;

    /// One definition by id, `None` if it does not exist.
    fn get_definition_by_id(&self, definition_id: &str) -> ClientResult<Option<ArtifactDefinition>>;

    /// Versions of a definition, ascending by version number.
    fn list_versions(&self, definition_id: &str) -> ClientResult<Vec<ArtifactVersion>>;

    /// Full payload of one version, `None` if it no longer exists.
    fn fetch_version_payload(&self, version_id: &str) -> ClientResult<Option<VersionPayload>>;

    /// Delete one version.
    fn delete_version(&self, version_id: &str) -> ClientResult<DeleteOutcome>;

    /// Create a definition, returning its id.
    fn create_definition(&self, spec: &DefinitionSpec) -> ClientResult<String>;

    /// Create a version under `spec.definition_id`, returning its id.
    fn create_version(&self, spec: &VersionSpec) -> ClientResult<String>;

    /// Identity of the connected org.
    fn get_org_context(&self) -> ClientResult<OrgContext>;
}
