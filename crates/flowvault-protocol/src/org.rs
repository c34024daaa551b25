//! Organization context.
//!
//! Fetched once per session so the operator can see which org a
//! destructive command is about to touch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization row from the standard (non-tooling) query endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_sandbox: bool,
    #[serde(default)]
    pub organization_type: Option<String>,
}

/// Kind of org a session is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => write!(f, "Sandbox"),
            Environment::Production => write!(f, "Production"),
        }
    }
}

/// Identity of the org behind the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgContext {
    pub id: String,
    pub name: String,
    pub is_sandbox: bool,
    pub org_type: String,
}

impl OrgContext {
    /// Build the context from an Organization row.
    ///
    /// An instance URL containing `sandbox` marks the org as a sandbox even
    /// when the row says otherwise.
    pub fn from_row(row: OrganizationRow, instance_url: &str) -> Self {
        let is_sandbox = row.is_sandbox || instance_url.to_lowercase().contains("sandbox");
        Self {
            id: row.id,
            name: row.name,
            is_sandbox,
            org_type: row.organization_type.unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    pub fn environment(&self) -> Environment {
        if self.is_sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment() == Environment::Production
    }

    /// One-line safety banner.
    pub fn banner(&self) -> String {
        format!(
            "Connected to: {}  {} Org ({}) ({})",
            self.name,
            self.org_type,
            self.id,
            self.environment()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(is_sandbox: bool) -> OrganizationRow {
        OrganizationRow {
            id: "00Dxx0000001gEREAY".to_string(),
            name: "Acme".to_string(),
            is_sandbox,
            organization_type: Some("Enterprise Edition".to_string()),
        }
    }

    #[test]
    fn test_production_banner() {
        let ctx = OrgContext::from_row(row(false), "https://acme.my.salesforce.com");
        assert!(ctx.is_production());
        assert!(ctx.banner().ends_with("(Production)"));
        assert!(ctx.banner().contains("Enterprise Edition Org"));
    }

    #[test]
    fn test_sandbox_flag_from_row() {
        let ctx = OrgContext::from_row(row(true), "https://acme.my.salesforce.com");
        assert_eq!(ctx.environment(), Environment::Sandbox);
    }

    #[test]
    fn test_sandbox_flag_from_instance_url() {
        let ctx = OrgContext::from_row(row(false), "https://acme--uat.sandbox.my.salesforce.com");
        assert_eq!(ctx.environment(), Environment::Sandbox);
        assert!(ctx.banner().ends_with("(Sandbox)"));
    }

    #[test]
    fn test_missing_org_type() {
        let mut r = row(false);
        r.organization_type = None;
        let ctx = OrgContext::from_row(r, "https://x");
        assert_eq!(ctx.org_type, "Unknown");
    }
}
