//! Mock Metadata Service
//!
//! In-memory stand-in for the remote metadata service, used by unit and
//! integration tests of the engines.
//!
//! # Behavior
//!
//! - Definitions and versions get 18-character ids (`300...`, `301...`)
//! - Deleting the active version is refused; deleting twice is `NotFound`
//! - Latest/active pointers are recomputed after every change
//! - Creating a version with `Status = Active` activates it
//! - Failures and delays can be injected per operation or per record id
//! - Every call is recorded for later inspection

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector, MockOp};
pub use service::MockMetadataService;
pub use state::{MockCall, MockState, StoredDefinition, StoredVersion, DEFINITION_KEY_PREFIX, VERSION_KEY_PREFIX};
