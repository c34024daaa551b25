//! Flowvault protocol types
//!
//! Records exchanged with the Salesforce Tooling API: flow definitions,
//! flow versions, organization context, and the create payloads used when
//! a bundle is restored.

pub mod definition;
pub mod error;
pub mod org;
pub mod query;
pub mod spec;
pub mod version;

pub use definition::{ArtifactDefinition, FlowDefinitionRow, VersionRef};
pub use error::{ServiceError, ServiceErrorCode};
pub use org::{Environment, OrgContext, OrganizationRow};
pub use query::{soql_quote, QueryResponse};
pub use spec::{CreateResponse, DefinitionSpec, VersionSpec, VersionStatus};
pub use version::{ArtifactVersion, FlowRow};

/// Tooling API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v52.0";

/// Namespace carried by metadata markup documents.
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";
