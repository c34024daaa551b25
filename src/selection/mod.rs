//! Artifact selection
//!
//! A [`SelectionSet`] is the caller-supplied, ordered set of flows one
//! operation applies to. Operators name flows either by FlowDefinition id
//! or by developer name:
//!
//! - `id:<id>` and `name:<developer name>` are explicit
//! - a bare token shaped like a FlowDefinition id (15 or 18 alphanumerics
//!   starting with key prefix `300`) is an id
//! - anything else is a developer name
//!
//! Duplicates are dropped, keeping the first occurrence.

use std::fmt;
use std::sync::OnceLock;

use flowvault_protocol::ArtifactDefinition;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::client::{ClientResult, MetadataClient};

/// Key prefix of FlowDefinition record ids
pub const FLOW_DEFINITION_KEY_PREFIX: &str = "300";

/// Selection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("empty selector")]
    Empty,

    #[error("selector '{0}' has an empty value")]
    EmptyValue(String),

    #[error("'{0}' is not a FlowDefinition id (expected 15 or 18 alphanumerics starting with 300)")]
    InvalidId(String),

    #[error("no flows selected")]
    NoSelectors,
}

/// One flow named by the operator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum ArtifactSelector {
    Id(String),
    DeveloperName(String),
}

fn definition_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^300[0-9A-Za-z]{12}(?:[0-9A-Za-z]{3})?$").ok())
        .as_ref()
}

/// Whether `token` is shaped like a FlowDefinition id
pub fn looks_like_definition_id(token: &str) -> bool {
    definition_id_pattern().is_some_and(|re| re.is_match(token))
}

impl ArtifactSelector {
    /// Parse one operator token
    pub fn parse(token: &str) -> Result<Self, SelectionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SelectionError::Empty);
        }

        if let Some(id) = token.strip_prefix("id:") {
            let id = id.trim();
            if id.is_empty() {
                return Err(SelectionError::EmptyValue(token.to_string()));
            }
            if !looks_like_definition_id(id) {
                return Err(SelectionError::InvalidId(id.to_string()));
            }
            return Ok(ArtifactSelector::Id(id.to_string()));
        }

        if let Some(name) = token.strip_prefix("name:") {
            let name = name.trim();
            if name.is_empty() {
                return Err(SelectionError::EmptyValue(token.to_string()));
            }
            return Ok(ArtifactSelector::DeveloperName(name.to_string()));
        }

        if looks_like_definition_id(token) {
            Ok(ArtifactSelector::Id(token.to_string()))
        } else {
            Ok(ArtifactSelector::DeveloperName(token.to_string()))
        }
    }

    /// Look the definition up. `Ok(None)` if it does not exist.
    pub fn resolve(&self, client: &dyn MetadataClient) -> ClientResult<Option<ArtifactDefinition>> {
        match self {
            ArtifactSelector::Id(id) => client.get_definition_by_id(id),
            ArtifactSelector::DeveloperName(name) => client.get_definition(name),
        }
    }

    /// The raw id or name
    pub fn value(&self) -> &str {
        match self {
            ArtifactSelector::Id(v) | ArtifactSelector::DeveloperName(v) => v,
        }
    }
}

impl fmt::Display for ArtifactSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSelector::Id(id) => write!(f, "id:{}", id),
            ArtifactSelector::DeveloperName(name) => write!(f, "{}", name),
        }
    }
}

impl From<&ArtifactDefinition> for ArtifactSelector {
    fn from(definition: &ArtifactDefinition) -> Self {
        ArtifactSelector::Id(definition.id.clone())
    }
}

/// Ordered, de-duplicated set of selectors scoped to one operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    selectors: Vec<ArtifactSelector>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse operator tokens. Fails on the first invalid token or when
    /// nothing was selected.
    pub fn parse<I, S>(tokens: I) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for token in tokens {
            set.insert(ArtifactSelector::parse(token.as_ref())?);
        }
        if set.is_empty() {
            return Err(SelectionError::NoSelectors);
        }
        Ok(set)
    }

    /// Select the given definitions by id
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a ArtifactDefinition>) -> Self {
        let mut set = Self::new();
        for definition in definitions {
            set.insert(ArtifactSelector::from(definition));
        }
        set
    }

    /// Add a selector; returns false if it was already present
    pub fn insert(&mut self, selector: ArtifactSelector) -> bool {
        if self.selectors.contains(&selector) {
            return false;
        }
        self.selectors.push(selector);
        true
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactSelector> {
        self.selectors.iter()
    }

    pub fn as_slice(&self) -> &[ArtifactSelector] {
        &self.selectors
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a ArtifactSelector;
    type IntoIter = std::slice::Iter<'a, ArtifactSelector>;

    fn into_iter(self) -> Self::IntoIter {
        self.selectors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMetadataService;

    #[test]
    fn test_id_shapes() {
        assert!(looks_like_definition_id("300Hs000000ABCD"));
        assert!(looks_like_definition_id("300Hs000000ABCDEFG"));
        assert!(!looks_like_definition_id("301Hs000000ABCDEFG"));
        assert!(!looks_like_definition_id("300Hs000000ABCDE"));
        assert!(!looks_like_definition_id("Order_Flow"));
    }

    #[test]
    fn test_parse_bare_tokens() {
        assert_eq!(
            ArtifactSelector::parse("300Hs000000ABCDEFG").unwrap(),
            ArtifactSelector::Id("300Hs000000ABCDEFG".into())
        );
        assert_eq!(
            ArtifactSelector::parse(" Order_Flow ").unwrap(),
            ArtifactSelector::DeveloperName("Order_Flow".into())
        );
    }

    #[test]
    fn test_parse_prefixed_tokens() {
        assert_eq!(
            ArtifactSelector::parse("name:300Hs000000ABCDEFG").unwrap(),
            ArtifactSelector::DeveloperName("300Hs000000ABCDEFG".into())
        );
        assert_eq!(
            ArtifactSelector::parse("id:300Hs000000ABCD").unwrap(),
            ArtifactSelector::Id("300Hs000000ABCD".into())
        );
        assert_eq!(
            ArtifactSelector::parse("id:Order_Flow"),
            Err(SelectionError::InvalidId("Order_Flow".into()))
        );
        assert!(matches!(ArtifactSelector::parse("name:"), Err(SelectionError::EmptyValue(_))));
        assert_eq!(ArtifactSelector::parse("  "), Err(SelectionError::Empty));
    }

    #[test]
    fn test_set_dedups_in_order() {
        let set = SelectionSet::parse(["B_Flow", "A_Flow", "name:B_Flow", "A_Flow"]).unwrap();
        let values: Vec<_> = set.iter().map(|s| s.value()).collect();
        assert_eq!(values, vec!["B_Flow", "A_Flow"]);
    }

    #[test]
    fn test_empty_set_rejected() {
        let tokens: Vec<String> = Vec::new();
        assert_eq!(SelectionSet::parse(tokens), Err(SelectionError::NoSelectors));
    }

    #[test]
    fn test_resolve() {
        let mock = MockMetadataService::new();
        let id = mock.add_flow("Order_Flow", 1, None);

        let by_name = ArtifactSelector::parse("Order_Flow").unwrap();
        assert_eq!(by_name.resolve(&mock).unwrap().unwrap().id, id);

        let by_id = ArtifactSelector::parse(&id).unwrap();
        assert_eq!(by_id, ArtifactSelector::Id(id.clone()));
        assert_eq!(by_id.resolve(&mock).unwrap().unwrap().developer_name, "Order_Flow");

        let missing = ArtifactSelector::parse("Missing_Flow").unwrap();
        assert!(missing.resolve(&mock).unwrap().is_none());
    }
}
