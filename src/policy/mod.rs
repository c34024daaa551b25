//! Selection & deletion policy engine
//!
//! Three retention policies decide which versions of a flow may go:
//!
//! | Policy        | Deletes                                   |
//! |---------------|-------------------------------------------|
//! | `keep-active` | every version except the active one       |
//! | `keep-latest` | every version except the latest one       |
//! | `delete-all`  | every version                             |
//!
//! The definition record itself is left to the service's own cleanup.

mod engine;
mod report;

pub use engine::PolicyEngine;
pub use report::{
    DefinitionOutcome, DeletionPlan, DeletionReport, PlanReport, UnitOutcome, VersionOutcome,
    VersionResult,
};

use std::fmt;
use std::str::FromStr;

use flowvault_protocol::{ArtifactDefinition, ArtifactVersion};
use serde::{Deserialize, Serialize};

/// Named retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionPolicy {
    /// Delete all versions except the active one
    KeepActive,
    /// Delete all versions except the latest one
    KeepLatest,
    /// Delete every version
    DeleteAll,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::KeepActive => "keep-active",
            RetentionPolicy::KeepLatest => "keep-latest",
            RetentionPolicy::DeleteAll => "delete-all",
        }
    }

    /// Whether the policy's choice depends on which version is active.
    /// Such policies do not act on a definition whose active version is
    /// missing from the listing. keep-latest keys on the latest pointer
    /// only.
    pub fn needs_consistent_listing(&self) -> bool {
        matches!(self, RetentionPolicy::KeepActive)
    }

    /// Versions this policy would delete, in listing order.
    pub fn eligible<'a>(
        &self,
        definition: &ArtifactDefinition,
        versions: &'a [ArtifactVersion],
    ) -> Vec<&'a ArtifactVersion> {
        match self {
            RetentionPolicy::KeepActive => versions
                .iter()
                .filter(|v| !definition.is_active_version(&v.id))
                .collect(),
            RetentionPolicy::KeepLatest => {
                let latest = latest_version_id(definition, versions);
                versions
                    .iter()
                    .filter(|v| Some(v.id.as_str()) != latest)
                    .collect()
            }
            RetentionPolicy::DeleteAll => versions.iter().collect(),
        }
    }
}

/// The definition's latest pointer, or the highest listed version if the
/// definition does not carry one.
fn latest_version_id<'a>(
    definition: &'a ArtifactDefinition,
    versions: &'a [ArtifactVersion],
) -> Option<&'a str> {
    definition.latest_version_id.as_deref().or_else(|| {
        versions
            .iter()
            .max_by_key(|v| v.version_number)
            .map(|v| v.id.as_str())
    })
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-active" => Ok(RetentionPolicy::KeepActive),
            "keep-latest" => Ok(RetentionPolicy::KeepLatest),
            "delete-all" => Ok(RetentionPolicy::DeleteAll),
            other => Err(format!(
                "unknown policy '{}' (expected keep-active, keep-latest or delete-all)",
                other
            )),
        }
    }
}
