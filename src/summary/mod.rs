//! Batch summaries and the failure taxonomy
//!
//! Every batch operation (deletion, backup, restore) ends in a report
//! carrying a [`BatchSummary`]: success, skip and failure counts plus a
//! stable process exit code.

mod batch;
mod entries;
mod failure;

pub use batch::{BatchSummary, UnitStatus, BATCH_SUMMARY_SCHEMA_VERSION};
pub use entries::{FailedArtifact, FailureReason, SkipEntry};
pub use failure::{ExitCode, ExitCodeAggregator, FailureKind, Status};
