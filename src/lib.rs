//! Flowvault: version lifecycle, retention and backup for Salesforce flows
//!
//! - [`client`]: the metadata service seam and its Tooling API implementation
//! - [`policy`]: retention policies that delete versions with per-unit fault isolation
//! - [`backup`]: dual-format bundles and the restore state machine
//! - [`inventory`]: definitions and versions annotated with lifecycle state
//!
//! Classification itself lives in `flowvault-classifier`, the wire records
//! in `flowvault-protocol`.

pub mod backup;
pub mod batch;
pub mod cancel;
pub mod client;
pub mod config;
pub mod inventory;
pub mod logging;
pub mod mock;
pub mod policy;
pub mod selection;
pub mod signal;
pub mod summary;

pub use backup::{BackupEngine, BackupReport, RestoreEngine, RestoreReport};
pub use batch::{BatchError, BatchOptions};
pub use cancel::{CancelReason, CancelToken};
pub use client::{ClientError, DeleteOutcome, MetadataClient, ToolingClient, ToolingClientConfig};
pub use config::{ConfigError, EffectiveConfig, Settings};
pub use inventory::Inventory;
pub use policy::{DeletionReport, PolicyEngine, RetentionPolicy};
pub use selection::{ArtifactSelector, SelectionSet};
pub use summary::{BatchSummary, ExitCode};
